use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::UserEntity,
    dto::{format_system_time, validation::validate_username},
};

/// Payload used to register a new player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RegisterUserRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: String,
}

/// Public projection of a user.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub created_at: String,
}

impl From<UserEntity> for UserSummary {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id,
            username: value.username,
            created_at: format_system_time(value.created_at),
        }
    }
}
