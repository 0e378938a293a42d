use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::messages::{CreateMessageRequest, MessageList, ReplyMessageRequest},
    error::AppResult,
    middleware::{auth::AuthUser, rate_limit::RateLimiterLayer, validate::ValidatedJson},
    models::Message,
    response::ApiResponse,
    routes::params::{IdPath, MessageListQuery, Pagination, QueryParams},
    services::message_service,
    state::AppState,
};

/// The public contact form shares the strict limiter with login.
pub fn router(limiter: RateLimiterLayer) -> Router<AppState> {
    let contact = Router::new()
        .route("/", post(create_message))
        .layer(limiter);

    Router::new()
        .merge(contact)
        .route("/", get(list_messages))
        .route("/mine", get(list_my_messages))
        .route("/{id}", get(get_message).delete(delete_message))
        .route("/{id}/reply", put(reply_message))
}

#[utoipa::path(
    post,
    path = "/api/messages",
    request_body = CreateMessageRequest,
    responses(
        (status = 201, description = "Message sent", body = ApiResponse<Message>),
        (status = 400, description = "Validation failed"),
        (status = 429, description = "Too many requests")
    ),
    tag = "Messages"
)]
pub async fn create_message(
    State(state): State<AppState>,
    sender: Option<AuthUser>,
    ValidatedJson(payload): ValidatedJson<CreateMessageRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Message>>)> {
    let resp = message_service::create_message(&state, sender.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/messages/mine",
    params(Pagination),
    responses(
        (status = 200, description = "Messages sent by the current user", body = ApiResponse<MessageList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Messages"
)]
pub async fn list_my_messages(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(pagination): QueryParams<Pagination>,
) -> AppResult<Json<ApiResponse<MessageList>>> {
    let resp = message_service::list_my_messages(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/messages",
    params(Pagination, MessageListQuery),
    responses(
        (status = 200, description = "All messages", body = ApiResponse<MessageList>),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Messages"
)]
pub async fn list_messages(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(pagination): QueryParams<Pagination>,
    QueryParams(query): QueryParams<MessageListQuery>,
) -> AppResult<Json<ApiResponse<MessageList>>> {
    let resp = message_service::list_messages(&state, &user, pagination, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/messages/{id}",
    params(
        ("id" = Uuid, Path, description = "Message ID")
    ),
    responses(
        (status = 200, description = "Message, marked read", body = ApiResponse<Message>),
        (status = 404, description = "Message not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Messages"
)]
pub async fn get_message(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath<Uuid>,
) -> AppResult<Json<ApiResponse<Message>>> {
    let resp = message_service::get_message(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/messages/{id}/reply",
    params(
        ("id" = Uuid, Path, description = "Message ID")
    ),
    request_body = ReplyMessageRequest,
    responses(
        (status = 200, description = "Reply stored", body = ApiResponse<Message>),
        (status = 404, description = "Message not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Messages"
)]
pub async fn reply_message(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<ReplyMessageRequest>,
) -> AppResult<Json<ApiResponse<Message>>> {
    let resp = message_service::reply_message(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/messages/{id}",
    params(
        ("id" = Uuid, Path, description = "Message ID")
    ),
    responses(
        (status = 200, description = "Message deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Message not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Messages"
)]
pub async fn delete_message(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = message_service::delete_message(&state, &user, id).await?;
    Ok(Json(resp))
}
