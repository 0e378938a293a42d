use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use sea_orm::EntityTrait;
use uuid::Uuid;

use crate::{
    dto::auth::Claims,
    entity::Users,
    error::{AppError, MSG_INVALID_TOKEN, MSG_NO_TOKEN},
    models::Role,
    state::AppState,
};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owners may see their own records, admins may see everyone's.
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.is_admin() || self.user_id == owner_id
    }
}

pub fn ensure_role(user: &AuthUser, role: Role) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, Role::Admin)
}

pub const MSG_USER_GONE: &str = "User no longer exists";

/// Claims carried by the token. Callers still check them against `users`.
pub fn decode_token(token: &str, secret: &str) -> Result<AuthUser, AppError> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    let user_id = Uuid::parse_str(&decoded.claims.sub)
        .map_err(|_| AppError::Unauthorized(MSG_INVALID_TOKEN.into()))?;
    let role = decoded
        .claims
        .role
        .parse::<Role>()
        .map_err(|_| AppError::Unauthorized(MSG_INVALID_TOKEN.into()))?;

    Ok(AuthUser { user_id, role })
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized(MSG_INVALID_TOKEN.into()))?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized(MSG_INVALID_TOKEN.into()))?;

    Ok(Some(token))
}

/// Identity and role as stored now. A role change or a deleted account takes
/// effect on the next request, whatever the token still claims.
pub async fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, AppError> {
    let claimed = decode_token(token, &state.config.jwt_secret)?;
    let user = Users::find_by_id(claimed.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::Unauthorized(MSG_USER_GONE.into()))?;

    Ok(AuthUser {
        user_id: user.id,
        role: Role::from_db(&user.role)?,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| AppError::Unauthorized(MSG_NO_TOKEN.into()))?;
        authenticate(state, token).await
    }
}

/// `Option<AuthUser>`: absent header is anonymous, a bad token is still rejected.
impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => authenticate(state, token).await.map(Some),
            None => Ok(None),
        }
    }
}
