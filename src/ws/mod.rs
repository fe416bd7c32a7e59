//! Real-time notification fan-out over WebSockets.

pub mod hub;
pub mod messages;
pub mod session;

use async_trait::async_trait;

pub use hub::{Hub, OUTBOUND_CAPACITY, Payload, SessionHandle, SessionId};

use crate::error::AppResult;

/// The narrow surface a live session needs from the rest of the application.
#[async_trait]
pub trait SessionPort: Send + Sync {
    /// Drop the session from the hub. Must be idempotent.
    fn unregister(&self, session_id: SessionId);

    async fn mark_read(&self, notification_id: i64) -> AppResult<()>;
}
