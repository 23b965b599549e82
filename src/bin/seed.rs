use axum_storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    models::slugify,
    security::password,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin123", "admin").await?;
    let user_id = ensure_user(&pool, "user@example.com", "user123", "user").await?;
    seed_catalog(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    plaintext: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = password::hash(plaintext).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let answer_hash =
        password::hash("seed answer").map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, phone, address, answer_hash, role)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind("Seed User")
    .bind(email)
    .bind(password_hash)
    .bind("1234567890")
    .bind("1 Seed Street")
    .bind(answer_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let categories = ["Clothing", "Books", "Electronics"];
    let mut category_ids = Vec::new();

    for name in categories {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO categories (id, name, slug)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(slugify(name))
        .fetch_optional(pool)
        .await?;

        let id = match row {
            Some((id,)) => id,
            None => {
                let existing: (Uuid,) = sqlx::query_as("SELECT id FROM categories WHERE name = $1")
                    .bind(name)
                    .fetch_one(pool)
                    .await?;
                existing.0
            }
        };
        category_ids.push(id);
    }

    let products = [
        ("Axum Hoodie", "Warm hoodie for Rustaceans", 550000_i64, 50, category_ids[0]),
        ("E-book: Async Rust", "Learn async Rust patterns", 250000, 75, category_ids[1]),
        ("Ferris Mug", "Coffee tastes better with Ferris", 120000, 100, category_ids[2]),
        ("Rust Sticker Pack", "Decorate your laptop", 50000, 200, category_ids[2]),
    ];

    for (name, desc, price, stock, category_id) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, slug, description, price, quantity, shipping, category_id)
            VALUES ($1, $2, $3, $4, $5, $6, true, $7)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(slugify(name))
        .bind(desc)
        .bind(price)
        .bind(stock)
        .bind(category_id)
        .execute(pool)
        .await?;
    }

    println!("Seeded catalog");
    Ok(())
}
