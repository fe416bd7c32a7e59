use rust_decimal::Decimal;
use surplus_food_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
};

const DEMO_RESTAURANT_ID: i64 = 1;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, 2).await?;
    // Ensure migrations are applied.
    run_migrations(&pool).await?;

    let existing: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM inventory_items WHERE restaurant_id = $1",
    )
    .bind(DEMO_RESTAURANT_ID)
    .fetch_one(&pool)
    .await?;
    if existing > 0 {
        println!("Restaurant {DEMO_RESTAURANT_ID} already seeded");
        return Ok(());
    }

    let inventory = [
        ("Sourdough loaf", Decimal::new(250, 2), 12),
        ("Croissant box", Decimal::new(400, 2), 6),
        ("Vegetable soup (1L)", Decimal::new(350, 2), 8),
    ];
    for (name, price, quantity) in inventory {
        sqlx::query(
            r#"
            INSERT INTO inventory_items (restaurant_id, name, surplus_price, quantity, expiry_time)
            VALUES ($1, $2, $3, $4, NOW() + INTERVAL '1 day')
            "#,
        )
        .bind(DEMO_RESTAURANT_ID)
        .bind(name)
        .bind(price)
        .bind(quantity)
        .execute(&pool)
        .await?;
    }

    let offer_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO offers (restaurant_id, name, surplus_price)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(DEMO_RESTAURANT_ID)
    .bind("End-of-day surprise bag")
    .bind(Decimal::new(500, 2))
    .fetch_one(&pool)
    .await?;

    println!(
        "Seed completed. Restaurant ID: {DEMO_RESTAURANT_ID}, {} inventory items, offer ID: {offer_id}",
        inventory.len()
    );
    Ok(())
}
