use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};

use crate::{
    dto::orders::{
        CreateOrderRequest, OrderList, OrderWithItems, PaymentInput, RestaurantOrdersQuery,
        UpdateOrderStatusRequest,
    },
    error::AppResult,
    models::{NotificationKind, Order},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order))
        .route("/pay", post(pay_order))
        .route("/{id}", get(get_order))
        .route("/{id}/status", patch(update_order_status))
        .route("/{id}/cancel", post(cancel_order))
        .route("/user/{user_id}", get(list_user_orders))
        .route("/restaurant/{restaurant_id}", get(list_restaurant_orders))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order placed", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Invalid line items or insufficient stock"),
        (status = 500, description = "Internal Server Error"),
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let created = state.orders.create_order(payload).await?;

    if let Err(err) = state
        .notifications
        .send_order_notification(created.order.id, "Your order has been placed")
        .await
    {
        tracing::warn!(order_id = created.order.id, error = %err, "order notification failed");
    }

    Ok(Json(ApiResponse::success(
        "Order created",
        created,
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = i64, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with its items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Not Found"),
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let data = state.orders.get_order_with_items(id).await?;
    Ok(Json(ApiResponse::success("OK", data, Some(Meta::empty()))))
}

#[utoipa::path(
    get,
    path = "/api/orders/user/{user_id}",
    params(("user_id" = i64, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Orders placed by a customer, newest first", body = ApiResponse<OrderList>),
    ),
    tag = "Orders"
)]
pub async fn list_user_orders(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let items = state.orders.get_user_orders(user_id).await?;
    let meta = Meta::total(items.len());
    Ok(Json(ApiResponse::success(
        "Ok",
        OrderList { items },
        Some(meta),
    )))
}

#[utoipa::path(
    get,
    path = "/api/orders/restaurant/{restaurant_id}",
    params(
        ("restaurant_id" = i64, Path, description = "Restaurant ID"),
        ("status" = Option<String>, Query, description = "Filter by status"),
    ),
    responses(
        (status = 200, description = "Orders received by a restaurant, newest first", body = ApiResponse<OrderList>),
    ),
    tag = "Orders"
)]
pub async fn list_restaurant_orders(
    State(state): State<AppState>,
    Path(restaurant_id): Path<i64>,
    Query(query): Query<RestaurantOrdersQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let items = state
        .orders
        .get_restaurant_orders(restaurant_id, query.status.as_deref())
        .await?;
    let meta = Meta::total(items.len());
    Ok(Json(ApiResponse::success(
        "Ok",
        OrderList { items },
        Some(meta),
    )))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}/status",
    params(("id" = i64, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order status updated", body = ApiResponse<Order>),
        (status = 400, description = "Invalid status"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Transition not allowed"),
    ),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = state.orders.update_status(id, &payload.status).await?;
    let message = format!("Your order #{} is now {}", order.id, order.status);
    notify_customer(&state, &order, &message).await;
    Ok(Json(ApiResponse::success(
        "Order updated",
        order,
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    params(("id" = i64, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order cancelled and stock restored", body = ApiResponse<Order>),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Order already completed or cancelled"),
    ),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = state.orders.cancel_order(id).await?;
    let message = format!("Your order #{} has been cancelled", order.id);
    notify_customer(&state, &order, &message).await;
    Ok(Json(ApiResponse::success(
        "Order cancelled",
        order,
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    post,
    path = "/api/orders/pay",
    request_body = PaymentInput,
    responses(
        (status = 200, description = "Payment recorded", body = ApiResponse<Order>),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Order already completed or cancelled"),
    ),
    tag = "Orders"
)]
pub async fn pay_order(
    State(state): State<AppState>,
    Json(payload): Json<PaymentInput>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = state.orders.process_payment(payload).await?;
    Ok(Json(ApiResponse::success(
        "Payment recorded",
        order,
        Some(Meta::empty()),
    )))
}

async fn notify_customer(state: &AppState, order: &Order, message: &str) {
    if order.user_id <= 0 {
        return;
    }
    if let Err(err) = state
        .notifications
        .create(
            order.user_id,
            order.restaurant_id,
            "Order Update",
            message,
            NotificationKind::OrderUpdate.as_str(),
        )
        .await
    {
        tracing::warn!(order_id = order.id, error = %err, "order notification failed");
    }
}
