use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    state::AppState,
    ws::{SessionPort, session},
};

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub user_id: Option<String>,
}

/// Parse the `user_id` query parameter. Must be a positive integer.
pub fn parse_user_id(query: &ConnectQuery) -> AppResult<i64> {
    let raw = query
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| AppError::BadRequest("user_id parameter is required".into()))?;
    match raw.parse::<i64>() {
        Ok(user_id) if user_id > 0 => Ok(user_id),
        _ => Err(AppError::BadRequest("invalid user_id parameter".into())),
    }
}

pub async fn connect(
    State(state): State<AppState>,
    Query(query): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let user_id = parse_user_id(&query)?;
    // The reader enforces the exact frame limit; the codec cap only bounds buffering.
    let response = ws
        .max_message_size(session::MAX_FRAME_BYTES * 2)
        .on_upgrade(move |socket| run_session(state, user_id, socket));
    Ok(response.into_response())
}

async fn run_session(state: AppState, user_id: i64, socket: WebSocket) {
    let (sink, stream) = socket.split();
    let (handle, outbound) = state.hub.open_session(user_id);
    state.hub.register(handle.clone());

    let port: Arc<dyn SessionPort> = state.notifications.clone();
    session::start(handle, outbound, sink, stream, port, state.clock.clone());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(user_id: Option<&str>) -> ConnectQuery {
        ConnectQuery {
            user_id: user_id.map(str::to_owned),
        }
    }

    #[test]
    fn accepts_positive_user_id() {
        assert_eq!(parse_user_id(&query(Some("42"))).unwrap(), 42);
    }

    #[test]
    fn rejects_missing_or_invalid_user_id() {
        for raw in [None, Some(""), Some("abc"), Some("0"), Some("-3")] {
            assert!(matches!(
                parse_user_id(&query(raw)),
                Err(AppError::BadRequest(_))
            ));
        }
    }
}
