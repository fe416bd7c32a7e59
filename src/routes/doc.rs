use utoipa::OpenApi;
use utoipa::openapi::OpenApi as OpenApiSpec;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        notifications::{
            BroadcastRequest, BroadcastResult, NotificationList, OfferNotificationRequest,
            UnreadCount,
        },
        orders::{
            CreateOrderRequest, OrderItemInput, OrderList, OrderWithItems, PaymentInput,
            UpdateOrderStatusRequest,
        },
    },
    models::{Notification, Order, OrderItem, OrderStatus},
    response::{ApiResponse, Meta},
    routes::{health, notifications, orders},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        orders::create_order,
        orders::get_order,
        orders::list_user_orders,
        orders::list_restaurant_orders,
        orders::update_order_status,
        orders::cancel_order,
        orders::pay_order,
        notifications::list_user_notifications,
        notifications::unread_count,
        notifications::list_restaurant_notifications,
        notifications::mark_read,
        notifications::delete_notification,
        notifications::broadcast,
        notifications::announce_offer
    ),
    components(
        schemas(
            Order,
            OrderItem,
            OrderStatus,
            Notification,
            CreateOrderRequest,
            OrderItemInput,
            PaymentInput,
            UpdateOrderStatusRequest,
            OrderList,
            OrderWithItems,
            NotificationList,
            UnreadCount,
            BroadcastRequest,
            BroadcastResult,
            OfferNotificationRequest,
            health::HealthData,
            Meta,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<Order>,
            ApiResponse<Notification>,
            ApiResponse<NotificationList>,
            ApiResponse<UnreadCount>,
            ApiResponse<BroadcastResult>
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Orders", description = "Order placement and lifecycle"),
        (name = "Notifications", description = "Stored notifications and broadcasts"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_order_and_notification_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/orders",
            "/api/orders/pay",
            "/api/orders/{id}/cancel",
            "/api/notifications/{id}/read",
            "/api/notifications/restaurant/{restaurant_id}/broadcast",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
