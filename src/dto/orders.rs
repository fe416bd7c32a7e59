use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Order, OrderItem};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub user_id: i64,
    pub restaurant_id: i64,
    pub order_items: Vec<OrderItemInput>,
    #[serde(default)]
    pub special_instructions: String,
    #[serde(default)]
    pub pickup_time: Option<DateTime<Utc>>,
}

/// A requested line. Set exactly one of `inventory_item_id` / `offer_id` (0 = unset).
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct OrderItemInput {
    #[serde(default)]
    pub inventory_item_id: i64,
    #[serde(default)]
    pub offer_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PaymentInput {
    pub order_id: i64,
    pub amount: Decimal,
    pub payment_method: String,
    #[serde(default)]
    pub stripe_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RestaurantOrdersQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
