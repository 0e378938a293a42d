use axum::Router;

use crate::{
    config::AppConfig,
    middleware::rate_limit::{api_rate_limiter, auth_rate_limiter},
    state::AppState,
};

pub mod analytics;
pub mod auth;
pub mod doc;
pub mod health;
pub mod invoices;
pub mod messages;
pub mod notifications;
pub mod orders;
pub mod params;
pub mod products;
pub mod upload;
pub mod users;

/// Everything under `/api`. State is bound at the top level.
pub fn create_api_router(config: &AppConfig) -> anyhow::Result<Router<AppState>> {
    let strict = auth_rate_limiter(config.trust_proxy)?;

    let router = Router::new()
        .nest("/auth", auth::router(strict.clone()))
        .nest("/products", products::router())
        .nest("/orders", orders::router())
        .nest("/users", users::router())
        .nest("/invoices", invoices::router())
        .nest("/messages", messages::router(strict))
        .nest("/analytics", analytics::router())
        .nest("/upload", upload::router(config.upload_max_bytes))
        .nest("/notifications", notifications::router())
        .layer(api_rate_limiter(config.trust_proxy)?);

    Ok(router)
}
