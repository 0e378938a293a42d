use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::{
        analytics::{ActivityList, SalesSeries, Summary, TopProductList},
        products::ProductList,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::{LowStockQuery, Pagination, QueryParams, SalesQuery, TopProductsQuery},
    services::analytics_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/summary", get(summary))
        .route("/sales", get(sales))
        .route("/top-products", get(top_products))
        .route("/low-stock", get(low_stock))
        .route("/activity", get(activity))
}

#[utoipa::path(
    get,
    path = "/api/analytics/summary",
    responses(
        (status = 200, description = "Dashboard totals", body = ApiResponse<Summary>),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Analytics"
)]
pub async fn summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Summary>>> {
    let resp = analytics_service::summary(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/analytics/sales",
    params(SalesQuery),
    responses(
        (status = 200, description = "Paid revenue per day", body = ApiResponse<SalesSeries>)
    ),
    security(("bearer_auth" = [])),
    tag = "Analytics"
)]
pub async fn sales(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(query): QueryParams<SalesQuery>,
) -> AppResult<Json<ApiResponse<SalesSeries>>> {
    let resp = analytics_service::sales(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/analytics/top-products",
    params(TopProductsQuery),
    responses(
        (status = 200, description = "Best sellers by quantity", body = ApiResponse<TopProductList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Analytics"
)]
pub async fn top_products(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(query): QueryParams<TopProductsQuery>,
) -> AppResult<Json<ApiResponse<TopProductList>>> {
    let resp = analytics_service::top_products(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/analytics/low-stock",
    params(Pagination, LowStockQuery),
    responses(
        (status = 200, description = "Products at or below the threshold", body = ApiResponse<ProductList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Analytics"
)]
pub async fn low_stock(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(pagination): QueryParams<Pagination>,
    QueryParams(query): QueryParams<LowStockQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = analytics_service::low_stock(&state, &user, pagination, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/analytics/activity",
    params(Pagination),
    responses(
        (status = 200, description = "Recent audit log entries", body = ApiResponse<ActivityList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Analytics"
)]
pub async fn activity(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(pagination): QueryParams<Pagination>,
) -> AppResult<Json<ApiResponse<ActivityList>>> {
    let resp = analytics_service::activity(&state, &user, pagination).await?;
    Ok(Json(resp))
}
