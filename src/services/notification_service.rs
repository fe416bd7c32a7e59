use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    db::DbPool,
    error::{AppError, AppResult},
    models::{Audience, Notification, NotificationKind},
    ws::{Hub, Payload, SessionId, SessionPort},
};

/// Persists notifications and pushes user-scoped ones to live sessions.
pub struct NotificationService {
    pool: DbPool,
    hub: Arc<Hub>,
}

impl NotificationService {
    pub fn new(pool: DbPool, hub: Arc<Hub>) -> Self {
        Self { pool, hub }
    }

    /// Insert a notification, then push it to the user's sessions.
    ///
    /// `user_id = 0` makes it restaurant-scoped: stored, never pushed.
    /// Push is best-effort and cannot fail the call.
    pub async fn create(
        &self,
        user_id: i64,
        restaurant_id: i64,
        title: &str,
        message: &str,
        kind: &str,
    ) -> AppResult<Notification> {
        let audience = Audience::for_user_id(user_id);
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (audience, user_id, restaurant_id, title, message, type)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, restaurant_id, title, message, type, is_read, created_at
            "#,
        )
        .bind(audience.as_str())
        .bind(user_id.max(0))
        .bind(restaurant_id)
        .bind(title)
        .bind(message)
        .bind(kind)
        .fetch_one(&self.pool)
        .await?;

        if audience == Audience::User {
            self.push(&notification);
        }

        Ok(notification)
    }

    fn push(&self, notification: &Notification) {
        let body = match serde_json::to_string(notification) {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(notification_id = notification.id, error = %err, "failed to serialize notification");
                return;
            }
        };
        let delivered = self.hub.send_to_user(notification.user_id, &Payload::from(body));
        tracing::debug!(
            notification_id = notification.id,
            user_id = notification.user_id,
            delivered,
            "notification pushed"
        );
    }

    /// Newest first.
    pub async fn list_for_user(&self, user_id: i64, unread_only: bool) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, restaurant_id, title, message, type, is_read, created_at
            FROM notifications
            WHERE audience = 'user' AND user_id = $1 AND ($2 = FALSE OR is_read = FALSE)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Restaurant-scoped notifications, newest first.
    pub async fn list_for_restaurant(
        &self,
        restaurant_id: i64,
        unread_only: bool,
    ) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, restaurant_id, title, message, type, is_read, created_at
            FROM notifications
            WHERE audience = 'restaurant' AND restaurant_id = $1 AND ($2 = FALSE OR is_read = FALSE)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(restaurant_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn mark_read(&self, id: i64) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications SET is_read = TRUE WHERE id = $1
            RETURNING id, user_id, restaurant_id, title, message, type, is_read, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound)
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    pub async fn unread_count(&self, user_id: i64) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE audience = 'user' AND user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Notify every user who has ordered from the restaurant. Returns how many rows were created.
    pub async fn broadcast_to_restaurant(
        &self,
        restaurant_id: i64,
        title: &str,
        message: &str,
        kind: &str,
    ) -> AppResult<usize> {
        let user_ids = sqlx::query_scalar::<_, i64>(
            "SELECT DISTINCT user_id FROM orders WHERE restaurant_id = $1 AND user_id > 0 ORDER BY user_id",
        )
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await?;

        let mut created = 0;
        for user_id in user_ids {
            match self.create(user_id, restaurant_id, title, message, kind).await {
                Ok(_) => created += 1,
                Err(err) => {
                    tracing::warn!(user_id, restaurant_id, error = %err, "failed to create broadcast notification")
                }
            }
        }

        tracing::info!(restaurant_id, created, "restaurant broadcast sent");
        Ok(created)
    }

    pub async fn send_offer_notification(&self, restaurant_id: i64, offer_name: &str) -> AppResult<usize> {
        let message = format!("A new offer '{offer_name}' is now available at a restaurant near you!");
        self.broadcast_to_restaurant(
            restaurant_id,
            "New Surplus Offer Available",
            &message,
            NotificationKind::NewOffer.as_str(),
        )
        .await
    }

    /// Tell the customer about their order and the restaurant about a new one.
    ///
    /// Only the order lookup can fail; individual notification failures are logged.
    pub async fn send_order_notification(&self, order_id: i64, message: &str) -> AppResult<()> {
        let (user_id, restaurant_id) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT user_id, restaurant_id FROM orders WHERE id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound)?;

        let kind = NotificationKind::OrderUpdate.as_str();

        if user_id > 0 {
            if let Err(err) = self
                .create(user_id, restaurant_id, "Order Update", message, kind)
                .await
            {
                tracing::warn!(order_id, user_id, error = %err, "failed to notify customer");
            }
        }

        let restaurant_message = format!("New order #{order_id} received");
        if let Err(err) = self
            .create(0, restaurant_id, "New Order", &restaurant_message, kind)
            .await
        {
            tracing::warn!(order_id, restaurant_id, error = %err, "failed to notify restaurant");
        }

        Ok(())
    }
}

#[async_trait]
impl SessionPort for NotificationService {
    fn unregister(&self, session_id: SessionId) {
        self.hub.unregister(session_id);
    }

    async fn mark_read(&self, notification_id: i64) -> AppResult<()> {
        NotificationService::mark_read(self, notification_id).await?;
        Ok(())
    }
}
