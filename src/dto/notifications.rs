use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Notification;

#[derive(Debug, Deserialize, ToSchema)]
pub struct NotificationListQuery {
    pub unread_only: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationList {
    pub items: Vec<Notification>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BroadcastRequest {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OfferNotificationRequest {
    pub offer_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BroadcastResult {
    pub recipients: usize,
}
