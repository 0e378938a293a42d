use axum::{
    body::Body,
    extract::Multipart,
    http::{HeaderValue, header},
    response::Response,
};
use uuid::Uuid;

use crate::{
    audit,
    blob_store::{BlobStore, NewFile},
    dto::upload::{ImageList, UploadedImage},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::ImageFile,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub const IMAGE_FIELD: &str = "image";
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];
const CACHE_FOREVER: &str = "public, max-age=31536000, immutable";

pub fn is_allowed_image(content_type: &str) -> bool {
    ALLOWED_IMAGE_TYPES.contains(&content_type)
}

/// Keep the last path component and drop anything that is not a plain filename character.
pub fn clean_filename(raw: Option<&str>) -> String {
    let base = raw
        .unwrap_or_default()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .take(200)
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

pub fn download_url(base_url: &str, id: Uuid) -> String {
    format!("{base_url}/api/upload/{id}")
}

fn with_url(state: &AppState, file: ImageFile) -> UploadedImage {
    UploadedImage {
        url: download_url(&state.config.public_base_url, file.id),
        file,
    }
}

struct IncomingImage {
    filename: String,
    content_type: String,
    data: Vec<u8>,
}

async fn read_image(mut multipart: Multipart, max_bytes: usize) -> AppResult<IncomingImage> {
    let mut image: Option<IncomingImage> = None;

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) || image.is_some() {
            return Err(AppError::Upload("Unexpected field".into()));
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !is_allowed_image(&content_type) {
            return Err(AppError::Upload("Only image files are allowed".into()));
        }
        let filename = clean_filename(field.file_name());

        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await? {
            if data.len() + chunk.len() > max_bytes {
                return Err(AppError::Upload("File too large".into()));
            }
            data.extend_from_slice(&chunk);
        }

        image = Some(IncomingImage {
            filename,
            content_type,
            data,
        });
    }

    let image = image.ok_or_else(|| AppError::Upload("No file uploaded".into()))?;
    if image.data.is_empty() {
        return Err(AppError::Upload("Uploaded file is empty".into()));
    }
    Ok(image)
}

pub async fn upload_image(
    state: &AppState,
    user: &AuthUser,
    multipart: Multipart,
) -> AppResult<ApiResponse<UploadedImage>> {
    ensure_admin(user)?;
    let image = read_image(multipart, state.config.upload_max_bytes).await?;

    let file = state
        .blobs
        .put(NewFile {
            filename: &image.filename,
            content_type: &image.content_type,
            uploaded_by: Some(user.user_id),
            data: &image.data,
        })
        .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "image_upload",
        "image_files",
        serde_json::json!({ "file_id": file.id, "length": file.length }),
    )
    .await;
    tracing::info!(file_id = %file.id, length = file.length, "image uploaded");

    Ok(ApiResponse::success(
        "Image uploaded",
        with_url(state, file),
        Some(Meta::empty()),
    ))
}

pub async fn list_images(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ImageList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();
    let (files, total) = state.blobs.list(limit, offset).await?;
    let items = files.into_iter().map(|f| with_url(state, f)).collect();

    Ok(ApiResponse::success(
        "Images",
        ImageList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn download_image(state: &AppState, id: Uuid) -> AppResult<Response> {
    let file = state
        .blobs
        .metadata(id)
        .await?
        .ok_or_else(|| AppError::not_found("Image"))?;

    let content_type = HeaderValue::from_str(&file.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let body = Body::from_stream(state.blobs.stream(&file));

    Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, file.length)
        .header(header::CACHE_CONTROL, CACHE_FOREVER)
        .body(body)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
}

pub async fn delete_image(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    // File removal and product cleanup commit together or not at all.
    let mut tx = state.pool.begin().await?;
    if !BlobStore::delete_in(&mut tx, id).await? {
        return Err(AppError::not_found("Image"));
    }
    sqlx::query(
        "UPDATE products SET image_ids = array_remove(image_ids, $1), updated_at = NOW() WHERE $1 = ANY(image_ids)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "image_delete",
        "image_files",
        serde_json::json!({ "file_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Image deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
