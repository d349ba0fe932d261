use std::time::SystemTime;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::UserEntity,
    dto::user::{RegisterUserRequest, UserSummary},
    error::ServiceError,
    state::{SharedState, lobby::LobbyError},
};

/// Create a new player account, failing with `USERNAME_TAKEN` when the name is in use.
pub async fn register_user(
    state: &SharedState,
    request: RegisterUserRequest,
) -> Result<UserSummary, ServiceError> {
    let store = state.require_game_store().await?;
    if let Some(existing) = store.find_user_by_username(request.username.clone()).await? {
        debug!(user_id = %existing.id, username = %existing.username, "username already taken");
        return Err(LobbyError::UsernameTaken.into());
    }
    let user = UserEntity {
        id: Uuid::new_v4(),
        username: request.username,
        created_at: SystemTime::now(),
    };
    store.save_user(user.clone()).await?;
    info!(user_id = %user.id, username = %user.username, "registered user");
    Ok(user.into())
}

/// Load a user, failing with `USER_NOT_FOUND` when unknown.
pub async fn require_user(state: &SharedState, id: Uuid) -> Result<UserEntity, ServiceError> {
    let store = state.require_game_store().await?;
    store
        .find_user(id)
        .await?
        .ok_or(ServiceError::Lobby(LobbyError::UserNotFound))
}

pub async fn get_user(state: &SharedState, id: Uuid) -> Result<UserSummary, ServiceError> {
    require_user(state, id).await.map(Into::into)
}
