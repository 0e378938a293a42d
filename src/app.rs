use std::time::Duration;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, OriginalUri},
    http::{HeaderName, HeaderValue, Method, Request, Response, StatusCode, header},
    middleware::map_response,
    routing::get,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::{
    error::ErrorBody,
    middleware::normalize::normalize_error_response,
    routes::{create_api_router, doc::scalar_docs, health},
    state::AppState,
};

/// JSON bodies outside the upload route.
pub const JSON_BODY_LIMIT: usize = 1024 * 1024;
const REQUEST_ID: &str = "x-request-id";

/// Full application router with every cross-cutting layer applied.
pub fn build_app(state: AppState) -> anyhow::Result<Router> {
    let api_router = create_api_router(&state.config)?;
    let request_id_header = HeaderName::from_static(REQUEST_ID);
    // Hard cap for any body; the upload route raises the extractor limit up to it.
    let hard_body_cap = state.config.upload_max_bytes.max(JSON_BODY_LIMIT) + 64 * 1024;

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            let request_id = request
                .headers()
                .get(REQUEST_ID)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id
            )
        })
        .on_request(|_request: &Request<_>, _span: &tracing::Span| {
            tracing::debug!("request started");
        })
        .on_response(|response: &Response<_>, latency: Duration, _span: &tracing::Span| {
            tracing::info!(
                status = %response.status(),
                ms = %latency.as_millis(),
                "request finished"
            );
        });

    let app = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_router)
        .merge(scalar_docs())
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(cors_layer(&state.config.cors_origin)?)
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(hard_body_cap))
        .layer(map_response(normalize_error_response))
        .layer(ConcurrencyLimitLayer::new(100))
        .with_state(state);

    Ok(app)
}

/// `*` allows any origin; otherwise a comma separated list of exact origins.
pub fn cors_layer(origins: &str) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(600));

    if origins.trim() == "*" {
        return Ok(layer.allow_origin(Any));
    }

    let list = origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(HeaderValue::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(layer.allow_origin(list).allow_credentials(true))
}

async fn not_found(OriginalUri(uri): OriginalUri) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody::new(format!("Route not found: {}", uri.path()))),
    )
}
