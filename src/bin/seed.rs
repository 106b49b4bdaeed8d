use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use grocery_erp_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let manager_id = ensure_manager(&pool, "manager@store.local", "manager123").await?;
    seed_products(&pool).await?;

    println!("Seed completed. Manager ID: {manager_id}");
    Ok(())
}

async fn ensure_manager(pool: &sqlx::PgPool, email: &str, password: &str) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, role)
        VALUES ($1, $2, $3, $4, 'manager')
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind("Store Manager")
    .bind(email)
    .bind(password_hash)
    .fetch_optional(pool)
    .await?;

    let manager_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured manager {email}");
    Ok(manager_id)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    // (sku, name, category, price cents, stock, min_stock, uom)
    let products = vec![
        ("FRU-0A1B2C3D", "Banana", "Fruits", 59, 120, 20, "dozen"),
        ("FRU-1B2C3D4E", "Apple Fuji", "Fruits", 299, 80, 15, "kg"),
        ("VEG-2C3D4E5F", "Tomato", "Vegetables", 149, 60, 10, "kg"),
        ("DAI-3D4E5F6A", "Whole Milk 1L", "Dairy", 189, 48, 12, "litre"),
        ("BAK-4E5F6A7B", "Sourdough Loaf", "Bakery", 450, 18, 6, "piece"),
        ("GRA-5F6A7B8C", "Basmati Rice 5kg", "Grains", 1299, 30, 8, "pack"),
        ("BEV-6A7B8C9D", "Orange Juice 1L", "Beverages", 350, 40, 10, "litre"),
        ("SNA-7B8C9D0E", "Salted Peanuts", "Snacks", 199, 55, 12, "pack"),
        ("HOU-8C9D0E1F", "Dish Soap 500ml", "Household", 275, 25, 8, "piece"),
    ];

    for (sku, name, category, price, stock, min_stock, uom) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, category, price, stock, min_stock, uom)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (sku) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(sku)
        .bind(name)
        .bind(category)
        .bind(price as i64)
        .bind(stock)
        .bind(min_stock)
        .bind(uom)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
