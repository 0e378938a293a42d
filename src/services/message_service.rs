use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::messages::{CreateMessageRequest, MessageList, ReplyMessageRequest},
    entity::messages::{ActiveModel as MessageActive, Column as MessageCol, Entity as Messages},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Message, MessageStatus, convert_all},
    response::{ApiResponse, Meta},
    routes::params::{MessageListQuery, Pagination},
    state::AppState,
};

pub async fn create_message(
    state: &AppState,
    sender: Option<&AuthUser>,
    payload: CreateMessageRequest,
) -> AppResult<ApiResponse<Message>> {
    let message = MessageActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(sender.map(|u| u.user_id)),
        name: Set(payload.name),
        email: Set(payload.email.trim().to_lowercase()),
        phone: Set(payload.phone),
        subject: Set(payload.subject),
        body: Set(payload.body),
        status: Set(MessageStatus::Unread.as_str().to_string()),
        reply: Set(None),
        replied_at: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    state.notifier.to_admins(
        "message_received",
        serde_json::json!({
            "message_id": message.id,
            "subject": message.subject,
            "email": message.email,
        }),
    );

    Ok(ApiResponse::success(
        "Message sent",
        Message::try_from(message)?,
        Some(Meta::empty()),
    ))
}

pub async fn list_my_messages(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<MessageList>> {
    let condition = Condition::all().add(MessageCol::UserId.eq(user.user_id));
    list_where(state, condition, pagination).await
}

pub async fn list_messages(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
    query: MessageListQuery,
) -> AppResult<ApiResponse<MessageList>> {
    ensure_admin(user)?;
    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(MessageCol::Status.eq(status.as_str()));
    }
    list_where(state, condition, pagination).await
}

async fn list_where(
    state: &AppState,
    condition: Condition,
    pagination: Pagination,
) -> AppResult<ApiResponse<MessageList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Messages::find()
        .filter(condition)
        .order_by_desc(MessageCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "Messages",
        MessageList {
            items: convert_all(models)?,
        },
        Some(Meta::new(page, limit, total)),
    ))
}

/// Opening an unread message marks it read.
pub async fn get_message(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Message>> {
    ensure_admin(user)?;
    let existing = Messages::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Message"))?;

    let model = if MessageStatus::from_db(&existing.status)? == MessageStatus::Unread {
        let mut active: MessageActive = existing.into();
        active.status = Set(MessageStatus::Read.as_str().to_string());
        active.update(&state.orm).await?
    } else {
        existing
    };

    Ok(ApiResponse::success("Message", Message::try_from(model)?, None))
}

pub async fn reply_message(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ReplyMessageRequest,
) -> AppResult<ApiResponse<Message>> {
    ensure_admin(user)?;
    let existing = Messages::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Message"))?;

    let mut active: MessageActive = existing.into();
    active.reply = Set(Some(payload.reply));
    active.status = Set(MessageStatus::Replied.as_str().to_string());
    active.replied_at = Set(Some(Utc::now().into()));
    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "message_reply",
        "messages",
        serde_json::json!({ "message_id": id }),
    )
    .await;
    if let Some(sender) = updated.user_id {
        state.notifier.to_user(
            sender,
            "message_replied",
            serde_json::json!({ "message_id": id, "subject": updated.subject }),
        );
    }

    Ok(ApiResponse::success(
        "Reply saved",
        Message::try_from(updated)?,
        Some(Meta::empty()),
    ))
}

pub async fn delete_message(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Messages::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Message"));
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "message_delete",
        "messages",
        serde_json::json!({ "message_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Message deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
