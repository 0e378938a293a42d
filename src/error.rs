use axum::{
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use sea_orm::SqlErr;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrorsKind;

pub const MSG_NO_TOKEN: &str = "Not authorized, no token";
pub const MSG_INVALID_TOKEN: &str = "Invalid token";
pub const MSG_EXPIRED_TOKEN: &str = "Token expired, please log in again";
pub const MSG_FORBIDDEN: &str = "Not authorized to access this resource";
pub const MSG_RESOURCE_NOT_FOUND: &str = "Resource not found";
pub const MSG_DUPLICATE: &str = "Duplicate field value entered";
pub const MSG_REFERENCED: &str = "Referenced resource is still in use or does not exist";
pub const MSG_TOO_MANY: &str = "Too many requests, please try again later";
pub const MSG_TOO_LARGE: &str = "Request body too large";
pub const MSG_SERVER: &str = "Server Error";

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{}", MSG_FORBIDDEN)]
    Forbidden,

    /// An id in the path that does not parse.
    #[error("{}", MSG_RESOURCE_NOT_FOUND)]
    Cast,

    #[error("{}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    /// Multipart upload problems: size, unexpected field, wrong type.
    #[error("{0}")]
    Upload(String),

    #[error("{}", MSG_TOO_LARGE)]
    PayloadTooLarge,

    #[error("{}", MSG_TOO_MANY)]
    TooManyRequests,

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Token error")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{what} not found"))
    }

    /// Status, public message and optional per-field detail for this error.
    pub fn classify(&self) -> (StatusCode, String, Option<Vec<FieldError>>) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::BadRequest(msg) | AppError::Upload(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone(), None)
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone(), None),
            AppError::Forbidden => (StatusCode::FORBIDDEN, MSG_FORBIDDEN.to_string(), None),
            AppError::Cast => (
                StatusCode::NOT_FOUND,
                MSG_RESOURCE_NOT_FOUND.to_string(),
                None,
            ),
            AppError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                join_field_errors(fields),
                Some(fields.clone()),
            ),
            AppError::PayloadTooLarge => {
                (StatusCode::PAYLOAD_TOO_LARGE, MSG_TOO_LARGE.to_string(), None)
            }
            AppError::TooManyRequests => {
                (StatusCode::TOO_MANY_REQUESTS, MSG_TOO_MANY.to_string(), None)
            }
            AppError::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature => (
                    StatusCode::UNAUTHORIZED,
                    MSG_EXPIRED_TOKEN.to_string(),
                    None,
                ),
                _ => (StatusCode::UNAUTHORIZED, MSG_INVALID_TOKEN.to_string(), None),
            },
            AppError::DbError(err) => classify_sqlx(err),
            AppError::OrmError(err) => classify_orm(err),
            AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, MSG_SERVER.to_string(), None)
            }
        }
    }
}

fn classify_sqlx(err: &sqlx::Error) -> (StatusCode, String, Option<Vec<FieldError>>) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            MSG_RESOURCE_NOT_FOUND.to_string(),
            None,
        ),
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") => (
                StatusCode::BAD_REQUEST,
                duplicate_message(db.constraint()),
                None,
            ),
            Some("23503") => (StatusCode::BAD_REQUEST, MSG_REFERENCED.to_string(), None),
            Some("22P02") => (
                StatusCode::NOT_FOUND,
                MSG_RESOURCE_NOT_FOUND.to_string(),
                None,
            ),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, MSG_SERVER.to_string(), None),
        },
        _ => (StatusCode::INTERNAL_SERVER_ERROR, MSG_SERVER.to_string(), None),
    }
}

fn classify_orm(err: &sea_orm::DbErr) -> (StatusCode, String, Option<Vec<FieldError>>) {
    if let sea_orm::DbErr::RecordNotFound(_) = err {
        return (
            StatusCode::NOT_FOUND,
            MSG_RESOURCE_NOT_FOUND.to_string(),
            None,
        );
    }
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => (
            StatusCode::BAD_REQUEST,
            duplicate_message(quoted_name(&detail)),
            None,
        ),
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
            (StatusCode::BAD_REQUEST, MSG_REFERENCED.to_string(), None)
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, MSG_SERVER.to_string(), None),
    }
}

/// `users_email_key` -> `Duplicate field value entered: email`
pub fn duplicate_message(constraint: Option<&str>) -> String {
    let field = constraint
        .map(|c| c.strip_suffix("_key").unwrap_or(c))
        .and_then(|c| c.split_once('_').map(|(_, field)| field));
    match field {
        Some(field) if !field.is_empty() => format!("{MSG_DUPLICATE}: {field}"),
        _ => MSG_DUPLICATE.to_string(),
    }
}

fn quoted_name(detail: &str) -> Option<&str> {
    let start = detail.find('"')? + 1;
    let len = detail[start..].find('"')?;
    Some(&detail[start..start + len])
}

fn join_field_errors(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = Vec::new();
        collect_field_errors("", &errors, &mut fields);
        fields.sort_by(|a, b| a.field.cmp(&b.field).then(a.message.cmp(&b.message)));
        AppError::Validation(fields)
    }
}

/// Flatten nested struct and list errors into `parent.child` / `list[i].child` paths.
fn collect_field_errors(
    prefix: &str,
    errors: &validator::ValidationErrors,
    out: &mut Vec<FieldError>,
) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                out.extend(errs.iter().map(|e| FieldError {
                    field: path.clone(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{path} is invalid")),
                }));
            }
            ValidationErrorsKind::Struct(inner) => collect_field_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_field_errors(&format!("{path}[{index}]"), inner, out);
                }
            }
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        AppError::Cast
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge;
        }
        AppError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::Upload("File too large".into())
        } else {
            AppError::Upload(err.body_text())
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            errors: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, errors) = self.classify();

        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::debug!(status = %status, message = %message, "request rejected");
        }

        let body = ErrorBody {
            success: false,
            message,
            errors,
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
