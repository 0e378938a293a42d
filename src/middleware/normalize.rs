use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::error::{AppError, ErrorBody};

/// Rewrite error responses produced outside handlers (rate limiter, body
/// limit, method router) into the `{success, message}` shape. JSON bodies
/// are assumed to be ours already and pass through.
pub async fn normalize_error_response(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) || is_json(&response) {
        return response;
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let mut rewritten = AppError::TooManyRequests.into_response();
            if let Some(retry) = response.headers().get(header::RETRY_AFTER) {
                rewritten
                    .headers_mut()
                    .insert(header::RETRY_AFTER, retry.clone());
            }
            rewritten
        }
        StatusCode::PAYLOAD_TOO_LARGE => AppError::PayloadTooLarge.into_response(),
        other => {
            let message = other.canonical_reason().unwrap_or("Request failed");
            (other, axum::Json(ErrorBody::new(message))).into_response()
        }
    }
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}
