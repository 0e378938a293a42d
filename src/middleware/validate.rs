use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::{error::AppError, middleware::sanitize::sanitize_value};

/// JSON body that has been sanitised, deserialised and checked against the
/// DTO's `validator` rules.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(raw) = Json::<serde_json::Value>::from_request(req, state).await?;
        let payload = parse_and_validate(raw)?;
        Ok(ValidatedJson(payload))
    }
}

/// Sanitise a raw body and turn it into a validated DTO.
pub fn parse_and_validate<T>(raw: serde_json::Value) -> Result<T, AppError>
where
    T: DeserializeOwned + Validate,
{
    let cleaned = sanitize_value(raw);
    let payload: T = serde_json::from_value(cleaned)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))?;
    payload.validate()?;
    Ok(payload)
}
