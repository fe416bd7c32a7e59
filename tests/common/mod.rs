#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use surplus_food_api::{
    db::{create_pool, orm_from_pool, run_migrations},
    state::AppState,
};

/// Database URL for integration tests, or `None` to skip.
pub fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            None
        }
    }
}

pub async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url, 5).await?;
    run_migrations(&pool).await?;

    // Clean tables between runs
    sqlx::query(
        "TRUNCATE TABLE notifications, order_items, orders, offers, inventory_items RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await?;

    let orm = orm_from_pool(&pool);
    Ok(AppState::new(pool, orm, Arc::new(mockable::DefaultClock)))
}

pub async fn seed_inventory(
    state: &AppState,
    restaurant_id: i64,
    price: Decimal,
    quantity: i32,
) -> anyhow::Result<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO inventory_items (restaurant_id, name, surplus_price, quantity)
        VALUES ($1, 'Test item', $2, $3)
        RETURNING id
        "#,
    )
    .bind(restaurant_id)
    .bind(price)
    .bind(quantity)
    .fetch_one(&state.pool)
    .await?;
    Ok(id)
}

pub async fn seed_offer(state: &AppState, restaurant_id: i64, price: Decimal) -> anyhow::Result<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO offers (restaurant_id, name, surplus_price)
        VALUES ($1, 'Surprise bag', $2)
        RETURNING id
        "#,
    )
    .bind(restaurant_id)
    .bind(price)
    .fetch_one(&state.pool)
    .await?;
    Ok(id)
}

pub async fn stock_of(state: &AppState, inventory_item_id: i64) -> anyhow::Result<i32> {
    let quantity = sqlx::query_scalar("SELECT quantity FROM inventory_items WHERE id = $1")
        .bind(inventory_item_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(quantity)
}

pub async fn count_orders(state: &AppState) -> anyhow::Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&state.pool)
        .await?;
    Ok(count)
}
