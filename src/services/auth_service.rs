use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    audit,
    config::AppConfig,
    dto::auth::{
        AuthResponse, ChangePasswordRequest, Claims, LoginRequest, RegisterRequest,
        UpdateProfileRequest,
    },
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Role, User},
    response::{ApiResponse, Meta},
    state::AppState,
};

const MSG_BAD_CREDENTIALS: &str = "Invalid email or password";

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn issue_token(config: &AppConfig, user_id: Uuid, role: Role) -> AppResult<String> {
    let now = Utc::now();
    let expiration = now
        .checked_add_signed(Duration::hours(config.jwt_expires_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        iat: now.timestamp() as usize,
        exp: expiration.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;
    Ok(token)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let email = normalize_email(&payload.email);
    let exists = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;
    if exists.is_some() {
        return Err(AppError::BadRequest("Email is already registered".into()));
    }

    let now = Utc::now();
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        email: Set(email),
        password_hash: Set(hash_password(&payload.password)?),
        phone: Set(payload.phone),
        address: Set(None),
        role: Set(Role::User.as_str().to_string()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    let user = User::try_from(user)?;
    let token = issue_token(&state.config, user.id, user.role)?;

    audit::record(
        &state.pool,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;
    tracing::info!(user_id = %user.id, "user registered");

    Ok(ApiResponse::success(
        "User registered",
        AuthResponse { token, user },
        None,
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let email = normalize_email(&payload.email);
    let user = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::Unauthorized(MSG_BAD_CREDENTIALS.into())),
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(AppError::Unauthorized(MSG_BAD_CREDENTIALS.into()));
    }

    let user = User::try_from(user)?;
    let token = issue_token(&state.config, user.id, user.role)?;

    audit::record(
        &state.pool,
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        AuthResponse { token, user },
        Some(Meta::empty()),
    ))
}

pub async fn current_user(state: &AppState, auth: &AuthUser) -> AppResult<ApiResponse<User>> {
    let user = Users::find_by_id(auth.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(ApiResponse::success("Profile", User::try_from(user)?, None))
}

pub async fn update_profile(
    state: &AppState,
    auth: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    let existing = Users::find_by_id(auth.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let mut active: UserActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(Some(phone));
    }
    if let Some(address) = payload.address {
        active.address = Set(Some(address).filter(|a| !a.is_empty()));
    }
    active.updated_at = Set(Utc::now().into());
    let user = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(auth.user_id),
        "profile_update",
        "users",
        serde_json::json!({ "user_id": auth.user_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Profile updated",
        User::try_from(user)?,
        Some(Meta::empty()),
    ))
}

pub async fn change_password(
    state: &AppState,
    auth: &AuthUser,
    payload: ChangePasswordRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let existing = Users::find_by_id(auth.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    if !verify_password(&payload.current_password, &existing.password_hash)? {
        return Err(AppError::Unauthorized("Current password is incorrect".into()));
    }

    let mut active: UserActive = existing.into();
    active.password_hash = Set(hash_password(&payload.new_password)?);
    active.updated_at = Set(Utc::now().into());
    let user = User::try_from(active.update(&state.orm).await?)?;
    let token = issue_token(&state.config, user.id, user.role)?;

    audit::record(
        &state.pool,
        Some(user.id),
        "password_change",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Password updated",
        AuthResponse { token, user },
        Some(Meta::empty()),
    ))
}
