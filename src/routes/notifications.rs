use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};

use crate::{
    dto::notifications::{
        BroadcastRequest, BroadcastResult, NotificationList, NotificationListQuery,
        OfferNotificationRequest, UnreadCount,
    },
    error::AppResult,
    models::{Notification, NotificationKind},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", axum::routing::delete(delete_notification))
        .route("/{id}/read", post(mark_read))
        .route("/user/{user_id}", get(list_user_notifications))
        .route("/user/{user_id}/unread-count", get(unread_count))
        .route("/restaurant/{restaurant_id}", get(list_restaurant_notifications))
        .route("/restaurant/{restaurant_id}/broadcast", post(broadcast))
        .route("/restaurant/{restaurant_id}/offer", post(announce_offer))
}

#[utoipa::path(
    get,
    path = "/api/notifications/user/{user_id}",
    params(
        ("user_id" = i64, Path, description = "User ID"),
        ("unread_only" = Option<bool>, Query, description = "Only unread notifications"),
    ),
    responses(
        (status = 200, description = "User notifications, newest first", body = ApiResponse<NotificationList>),
    ),
    tag = "Notifications"
)]
pub async fn list_user_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<NotificationListQuery>,
) -> AppResult<Json<ApiResponse<NotificationList>>> {
    let items = state
        .notifications
        .list_for_user(user_id, query.unread_only.unwrap_or(false))
        .await?;
    let meta = Meta::total(items.len());
    Ok(Json(ApiResponse::success(
        "Ok",
        NotificationList { items },
        Some(meta),
    )))
}

#[utoipa::path(
    get,
    path = "/api/notifications/user/{user_id}/unread-count",
    params(("user_id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Unread notification count", body = ApiResponse<UnreadCount>),
    ),
    tag = "Notifications"
)]
pub async fn unread_count(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<ApiResponse<UnreadCount>>> {
    let count = state.notifications.unread_count(user_id).await?;
    Ok(Json(ApiResponse::success(
        "Ok",
        UnreadCount { count },
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    get,
    path = "/api/notifications/restaurant/{restaurant_id}",
    params(
        ("restaurant_id" = i64, Path, description = "Restaurant ID"),
        ("unread_only" = Option<bool>, Query, description = "Only unread notifications"),
    ),
    responses(
        (status = 200, description = "Restaurant notifications, newest first", body = ApiResponse<NotificationList>),
    ),
    tag = "Notifications"
)]
pub async fn list_restaurant_notifications(
    State(state): State<AppState>,
    Path(restaurant_id): Path<i64>,
    Query(query): Query<NotificationListQuery>,
) -> AppResult<Json<ApiResponse<NotificationList>>> {
    let items = state
        .notifications
        .list_for_restaurant(restaurant_id, query.unread_only.unwrap_or(false))
        .await?;
    let meta = Meta::total(items.len());
    Ok(Json(ApiResponse::success(
        "Ok",
        NotificationList { items },
        Some(meta),
    )))
}

#[utoipa::path(
    post,
    path = "/api/notifications/{id}/read",
    params(("id" = i64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked as read", body = ApiResponse<Notification>),
        (status = 404, description = "Not Found"),
    ),
    tag = "Notifications"
)]
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Notification>>> {
    let notification = state.notifications.mark_read(id).await?;
    Ok(Json(ApiResponse::success(
        "Notification updated",
        notification,
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    params(("id" = i64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification deleted"),
        (status = 404, description = "Not Found"),
    ),
    tag = "Notifications"
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    state.notifications.delete(id).await?;
    Ok(Json(ApiResponse::success(
        "Notification deleted",
        serde_json::json!({ "id": id }),
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    post,
    path = "/api/notifications/restaurant/{restaurant_id}/broadcast",
    params(("restaurant_id" = i64, Path, description = "Restaurant ID")),
    request_body = BroadcastRequest,
    responses(
        (status = 200, description = "Notification sent to past customers", body = ApiResponse<BroadcastResult>),
    ),
    tag = "Notifications"
)]
pub async fn broadcast(
    State(state): State<AppState>,
    Path(restaurant_id): Path<i64>,
    Json(payload): Json<BroadcastRequest>,
) -> AppResult<Json<ApiResponse<BroadcastResult>>> {
    let kind = payload
        .kind
        .as_deref()
        .filter(|k| !k.is_empty())
        .unwrap_or(NotificationKind::System.as_str());
    let recipients = state
        .notifications
        .broadcast_to_restaurant(restaurant_id, &payload.title, &payload.message, kind)
        .await?;
    Ok(Json(ApiResponse::success(
        "Broadcast sent",
        BroadcastResult { recipients },
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    post,
    path = "/api/notifications/restaurant/{restaurant_id}/offer",
    params(("restaurant_id" = i64, Path, description = "Restaurant ID")),
    request_body = OfferNotificationRequest,
    responses(
        (status = 200, description = "New offer announced to past customers", body = ApiResponse<BroadcastResult>),
    ),
    tag = "Notifications"
)]
pub async fn announce_offer(
    State(state): State<AppState>,
    Path(restaurant_id): Path<i64>,
    Json(payload): Json<OfferNotificationRequest>,
) -> AppResult<Json<ApiResponse<BroadcastResult>>> {
    let recipients = state
        .notifications
        .send_offer_notification(restaurant_id, &payload.offer_name)
        .await?;
    Ok(Json(ApiResponse::success(
        "Offer announced",
        BroadcastResult { recipients },
        Some(Meta::empty()),
    )))
}
