use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::Message;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateMessageRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 5, max = 20, message = "Phone number must be 5 to 20 characters"))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Subject is required"))]
    pub subject: String,
    #[validate(length(min = 1, max = 5000, message = "Message must be 1 to 5000 characters"))]
    pub body: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ReplyMessageRequest {
    #[validate(length(min = 1, max = 5000, message = "Reply must be 1 to 5000 characters"))]
    pub reply: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct MessageList {
    #[schema(value_type = Vec<Message>)]
    pub items: Vec<Message>,
}
