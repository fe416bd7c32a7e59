use std::sync::Arc;

use axum::extract::State;
use sqlx::postgres::PgPoolOptions;
use surplus_food_api::{db::orm_from_pool, routes::health::health_check, state::AppState};

// The pool is never used, so nothing connects.
fn offline_state() -> AppState {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/unused")
        .expect("lazy pool");
    let orm = orm_from_pool(&pool);
    AppState::new(pool, orm, Arc::new(mockable::DefaultClock))
}

#[tokio::test]
async fn health_check_returns_ok() {
    let response = health_check(State(offline_state())).await;
    assert_eq!(response.0.message, "Health check");

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "ok");
    assert_eq!(data.connected_sessions, 0);
}

#[tokio::test]
async fn health_check_counts_live_sessions() {
    let state = offline_state();
    let mut receivers = Vec::new();
    for user_id in [1, 1, 2] {
        let (session, rx) = state.hub.open_session(user_id);
        state.hub.register(session);
        receivers.push(rx);
    }

    let data = health_check(State(state)).await.0.data.expect("health data");
    assert_eq!(data.connected_sessions, 3);
    assert_eq!(data.connected_users, 2);
}
