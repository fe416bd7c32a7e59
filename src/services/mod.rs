pub mod notification_service;
pub mod order_service;
