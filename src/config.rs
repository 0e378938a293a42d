use std::env;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_expires_hours: i64,
    pub public_base_url: String,
    pub cors_origin: String,
    /// Key rate limits on `X-Forwarded-For` / `X-Real-IP`. Only safe behind a
    /// proxy that overwrites those headers.
    pub trust_proxy: bool,
    pub upload_max_bytes: usize,
    pub pricing: PricingConfig,
    pub low_stock_threshold: i32,
}

/// Order pricing knobs, all money in minor units.
#[derive(Debug, Clone, Copy)]
pub struct PricingConfig {
    pub shipping_fee: i64,
    pub free_shipping_threshold: i64,
    pub tax_rate_bps: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            shipping_fee: 5_000,
            free_shipping_threshold: 50_000,
            tax_rate_bps: 500,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("APP_PORT", 3000);
        let defaults = PricingConfig::default();

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            jwt_expires_hours: parse_or("JWT_EXPIRES_HOURS", 24),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            cors_origin: env::var("CORS_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            trust_proxy: parse_or("TRUST_PROXY", false),
            upload_max_bytes: parse_or("UPLOAD_MAX_BYTES", 5 * 1024 * 1024),
            pricing: PricingConfig {
                shipping_fee: parse_or("SHIPPING_FEE", defaults.shipping_fee),
                free_shipping_threshold: parse_or(
                    "FREE_SHIPPING_THRESHOLD",
                    defaults.free_shipping_threshold,
                ),
                tax_rate_bps: parse_or("TAX_RATE_BPS", defaults.tax_rate_bps),
            },
            low_stock_threshold: parse_or("LOW_STOCK_THRESHOLD", 10),
        })
    }

    /// Configuration for tests and tools that never touch the environment.
    pub fn for_tests(database_url: &str, jwt_secret: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            jwt_secret: jwt_secret.to_string(),
            jwt_expires_hours: 1,
            public_base_url: String::new(),
            cors_origin: "*".to_string(),
            trust_proxy: false,
            upload_max_bytes: 5 * 1024 * 1024,
            pricing: PricingConfig::default(),
            low_stock_threshold: 10,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
