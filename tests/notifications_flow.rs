mod common;

use std::time::Duration;

use surplus_food_api::{error::AppError, models::NotificationKind, state::AppState};

use common::setup_state;

const RESTAURANT: i64 = 9;

#[tokio::test]
async fn notification_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };
    let state = setup_state(&database_url).await?;

    user_notification_is_pushed_and_tracked(&state).await?;
    restaurant_notification_is_stored_only(&state).await?;
    broadcast_reaches_each_past_customer_once(&state).await?;

    let missing = state
        .notifications
        .send_order_notification(999_999, "Your order has been placed")
        .await;
    assert!(matches!(missing, Err(AppError::NotFound)));

    Ok(())
}

async fn user_notification_is_pushed_and_tracked(state: &AppState) -> anyhow::Result<()> {
    let (session, mut outbound) = state.hub.open_session(42);
    state.hub.register(session);

    let created = state
        .notifications
        .create(42, RESTAURANT, "Order Update", "Ready for pickup", NotificationKind::OrderUpdate.as_str())
        .await?;
    assert!(!created.is_read);

    let frame = tokio::time::timeout(Duration::from_secs(1), outbound.recv())
        .await?
        .expect("pushed frame");
    let pushed: serde_json::Value = serde_json::from_str(&frame)?;
    assert_eq!(pushed["id"], created.id);
    assert_eq!(pushed["type"], "order_update");
    assert_eq!(pushed["title"], "Order Update");

    assert_eq!(state.notifications.unread_count(42).await?, 1);
    let unread = state.notifications.list_for_user(42, true).await?;
    assert_eq!(unread.len(), 1);

    state.notifications.mark_read(created.id).await?;
    let again = state.notifications.mark_read(created.id).await?;
    assert!(again.is_read);
    assert_eq!(state.notifications.unread_count(42).await?, 0);
    assert!(state.notifications.list_for_user(42, true).await?.is_empty());
    assert_eq!(state.notifications.list_for_user(42, false).await?.len(), 1);

    state.notifications.delete(created.id).await?;
    assert!(matches!(
        state.notifications.delete(created.id).await,
        Err(AppError::NotFound)
    ));
    assert!(matches!(
        state.notifications.mark_read(created.id).await,
        Err(AppError::NotFound)
    ));
    Ok(())
}

async fn restaurant_notification_is_stored_only(state: &AppState) -> anyhow::Result<()> {
    let (session, mut outbound) = state.hub.open_session(0);
    state.hub.register(session);

    state
        .notifications
        .create(0, RESTAURANT, "New Order", "New order #1 received", NotificationKind::OrderUpdate.as_str())
        .await?;

    assert!(outbound.try_recv().is_err());
    assert!(state.notifications.list_for_user(0, false).await?.is_empty());
    let stored = state.notifications.list_for_restaurant(RESTAURANT, false).await?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "New Order");
    Ok(())
}

async fn broadcast_reaches_each_past_customer_once(state: &AppState) -> anyhow::Result<()> {
    for user_id in [101_i64, 102, 102] {
        sqlx::query("INSERT INTO orders (user_id, restaurant_id, total_amount) VALUES ($1, $2, 0)")
            .bind(user_id)
            .bind(RESTAURANT)
            .execute(&state.pool)
            .await?;
    }

    let recipients = state
        .notifications
        .send_offer_notification(RESTAURANT, "Bakery bundle")
        .await?;
    assert_eq!(recipients, 2);

    for user_id in [101, 102] {
        let received = state.notifications.list_for_user(user_id, false).await?;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind, "new_offer");
        assert!(received[0].message.contains("Bakery bundle"));
    }

    let none = state
        .notifications
        .broadcast_to_restaurant(RESTAURANT + 1, "Hello", "Nobody ordered", "system")
        .await?;
    assert_eq!(none, 0);
    Ok(())
}
