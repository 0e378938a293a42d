use axum::{Json, Router, extract::State, routing::get};
use uuid::Uuid;

use crate::{
    dto::invoices::InvoiceList,
    error::AppResult,
    middleware::auth::AuthUser,
    models::Invoice,
    response::ApiResponse,
    routes::params::{IdPath, InvoiceListQuery, Pagination, QueryParams},
    services::invoice_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_invoices))
        .route("/{id}", get(get_invoice))
        .route("/order/{order_id}", get(get_invoice_for_order))
}

#[utoipa::path(
    get,
    path = "/api/invoices",
    params(Pagination, InvoiceListQuery),
    responses(
        (status = 200, description = "Own invoices, or all for admins", body = ApiResponse<InvoiceList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Invoices"
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(pagination): QueryParams<Pagination>,
    QueryParams(query): QueryParams<InvoiceListQuery>,
) -> AppResult<Json<ApiResponse<InvoiceList>>> {
    let resp = invoice_service::list_invoices(&state, &user, pagination, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/invoices/{id}",
    params(
        ("id" = Uuid, Path, description = "Invoice ID")
    ),
    responses(
        (status = 200, description = "Invoice", body = ApiResponse<Invoice>),
        (status = 404, description = "Invoice not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Invoices"
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath<Uuid>,
) -> AppResult<Json<ApiResponse<Invoice>>> {
    let resp = invoice_service::get_invoice(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/invoices/order/{order_id}",
    params(
        ("order_id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Invoice of the order", body = ApiResponse<Invoice>),
        (status = 404, description = "Invoice not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Invoices"
)]
pub async fn get_invoice_for_order(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(order_id): IdPath<Uuid>,
) -> AppResult<Json<ApiResponse<Invoice>>> {
    let resp = invoice_service::get_invoice_for_order(&state, &user, order_id).await?;
    Ok(Json(resp))
}
