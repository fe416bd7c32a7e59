//! Wire-level frames exchanged with notification clients.

use serde::{Deserialize, Serialize};

/// Application frame received from a client, parsed once by the session reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    MarkRead { notification_id: i64 },
    Ping,
    Unknown,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Envelope {
    MarkRead { notification_id: i64 },
    Ping,
}

impl InboundMessage {
    /// Anything that is not a recognised `{"type": ...}` object maps to `Unknown`.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Envelope>(text) {
            Ok(Envelope::MarkRead { notification_id }) => InboundMessage::MarkRead { notification_id },
            Ok(Envelope::Ping) => InboundMessage::Ping,
            Err(error) => {
                tracing::debug!(error = %error, "ignoring unrecognised websocket frame");
                InboundMessage::Unknown
            }
        }
    }
}

/// Application-level control replies written by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundControl {
    Pong { timestamp: i64 },
}
