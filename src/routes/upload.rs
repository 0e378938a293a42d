use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Response,
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::upload::{ImageList, UploadedImage},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::{IdPath, Pagination, QueryParams},
    services::upload_service,
    state::AppState,
};

/// Multipart framing on top of the largest accepted image.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_images)
                .post(upload_image)
                .layer(DefaultBodyLimit::max(max_bytes + MULTIPART_OVERHEAD)),
        )
        .route("/{id}", get(download_image).delete(delete_image))
}

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content_type = "multipart/form-data", description = "Single file in field `image`"),
    responses(
        (status = 201, description = "Image stored", body = ApiResponse<UploadedImage>),
        (status = 400, description = "Missing, empty, oversize or non-image file"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Upload"
)]
pub async fn upload_image(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<UploadedImage>>)> {
    let resp = upload_service::upload_image(&state, &user, multipart).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/upload",
    params(Pagination),
    responses(
        (status = 200, description = "Stored images", body = ApiResponse<ImageList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Upload"
)]
pub async fn list_images(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(pagination): QueryParams<Pagination>,
) -> AppResult<Json<ApiResponse<ImageList>>> {
    let resp = upload_service::list_images(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/upload/{id}",
    params(
        ("id" = Uuid, Path, description = "Image ID")
    ),
    responses(
        (status = 200, description = "Image bytes", content_type = "application/octet-stream"),
        (status = 404, description = "Image not found")
    ),
    tag = "Upload"
)]
pub async fn download_image(
    State(state): State<AppState>,
    IdPath(id): IdPath<Uuid>,
) -> AppResult<Response> {
    upload_service::download_image(&state, id).await
}

#[utoipa::path(
    delete,
    path = "/api/upload/{id}",
    params(
        ("id" = Uuid, Path, description = "Image ID")
    ),
    responses(
        (status = 200, description = "Image deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Image not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Upload"
)]
pub async fn delete_image(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = upload_service::delete_image(&state, &user, id).await?;
    Ok(Json(resp))
}
