use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{Role, User};

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct UserList {
    #[schema(value_type = Vec<User>)]
    pub items: Vec<User>,
}
