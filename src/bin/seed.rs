use std::env;

use chrono::NaiveDate;
use medstore_api::{
    config::AppConfig,
    db::{DbPool, create_pool, run_migrations},
    models::Role,
    services::auth_service::hash_password,
};
use uuid::Uuid;

struct SeedProduct {
    name: &'static str,
    description: &'static str,
    category: &'static str,
    brand: &'static str,
    price: i64,
    stock: i32,
    requires_prescription: bool,
    expiry: (i32, u32, u32),
}

const CATALOG: &[SeedProduct] = &[
    SeedProduct {
        name: "Paracetamol 500mg (20 tablets)",
        description: "Relief from mild to moderate pain and fever",
        category: "Pain Relief",
        brand: "Calpol",
        price: 3_500,
        stock: 200,
        requires_prescription: false,
        expiry: (2027, 6, 30),
    },
    SeedProduct {
        name: "Ibuprofen 400mg (10 tablets)",
        description: "Anti-inflammatory pain reliever",
        category: "Pain Relief",
        brand: "Brufen",
        price: 4_200,
        stock: 150,
        requires_prescription: false,
        expiry: (2027, 3, 31),
    },
    SeedProduct {
        name: "Amoxicillin 500mg (15 capsules)",
        description: "Broad-spectrum antibiotic",
        category: "Antibiotics",
        brand: "Mox",
        price: 12_000,
        stock: 60,
        requires_prescription: true,
        expiry: (2026, 12, 31),
    },
    SeedProduct {
        name: "Cetirizine 10mg (10 tablets)",
        description: "Antihistamine for allergy relief",
        category: "Allergy",
        brand: "Zyrtec",
        price: 2_800,
        stock: 8,
        requires_prescription: false,
        expiry: (2027, 9, 30),
    },
    SeedProduct {
        name: "Vitamin D3 1000 IU (60 softgels)",
        description: "Daily vitamin D supplement",
        category: "Vitamins",
        brand: "HealthVit",
        price: 9_900,
        stock: 120,
        requires_prescription: false,
        expiry: (2028, 1, 31),
    },
    SeedProduct {
        name: "Digital Thermometer",
        description: "Fast reading oral and underarm thermometer",
        category: "Devices",
        brand: "Omron",
        price: 18_500,
        stock: 35,
        requires_prescription: false,
        expiry: (2030, 12, 31),
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let admin_email = env::var("SEED_ADMIN_EMAIL").unwrap_or_else(|_| "admin@medstore.local".into());
    let admin_password = env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "admin12345".into());

    let admin_id = ensure_user(&pool, "Store Admin", &admin_email, &admin_password, Role::Admin).await?;
    let user_id = ensure_user(
        &pool,
        "Demo Customer",
        "customer@medstore.local",
        "customer12345",
        Role::User,
    )
    .await?;
    seed_products(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

/// Insert or promote/demote an existing account to `role`. Passwords of
/// existing accounts are left alone.
async fn ensure_user(
    pool: &DbPool,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role, updated_at = now()
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email.trim().to_lowercase())
    .bind(password_hash)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;

    println!("Ensured {email} ({role})");
    Ok(id)
}

async fn seed_products(pool: &DbPool) -> anyhow::Result<()> {
    let mut inserted = 0;
    for product in CATALOG {
        let (year, month, day) = product.expiry;
        let expiry = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| anyhow::anyhow!("invalid expiry date for {}", product.name))?;

        let result = sqlx::query(
            r#"
            INSERT INTO products
                (id, name, description, category, brand, price, stock, requires_prescription, expiry_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product.name)
        .bind(product.description)
        .bind(product.category)
        .bind(product.brand)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.requires_prescription)
        .bind(expiry)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }

    println!("Seeded {inserted} new products");
    Ok(())
}
