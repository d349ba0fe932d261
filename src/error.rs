use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::lobby::LobbyError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Expected business outcome reported to the caller.
    #[error(transparent)]
    Lobby(#[from] LobbyError),
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Optimistic writes kept losing against concurrent updates.
    #[error("game `{game_id}` is under contention (gave up after {attempts} attempts)")]
    Contention { game_id: Uuid, attempts: u32 },
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Data the lobby depends on is missing from storage.
    #[error("not found: {0}")]
    NotFound(String),
}

impl ServiceError {
    /// Business error carried by this failure, if any.
    pub fn lobby(&self) -> Option<LobbyError> {
        match self {
            ServiceError::Lobby(err) => Some(*err),
            _ => None,
        }
    }

    /// Whether this failure comes from the infrastructure rather than the caller.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            ServiceError::Unavailable(_)
                | ServiceError::Degraded
                | ServiceError::Contention { .. }
                | ServiceError::NotFound(_)
        )
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Business rule rejection with its stable code.
    #[error("{0}")]
    Lobby(LobbyError),
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing or unknown caller identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("Internal server error")]
    Internal,
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Lobby(lobby) => AppError::Lobby(lobby),
            ServiceError::Unavailable(_) => AppError::ServiceUnavailable("storage unavailable".into()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Contention { .. } => {
                AppError::ServiceUnavailable("game is busy, retry later".into())
            }
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(_) => AppError::Internal,
        }
    }
}

/// JSON body returned for every error response.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Stable machine-readable code for business errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    /// Human-readable description.
    pub message: String,
}

/// HTTP status associated with a business error.
pub fn lobby_status(err: LobbyError) -> StatusCode {
    match err {
        LobbyError::GameNotFound | LobbyError::UserNotFound | LobbyError::NoChallengeAvailable => {
            StatusCode::NOT_FOUND
        }
        LobbyError::PlayerNotInGame | LobbyError::PlayerNotHost => StatusCode::FORBIDDEN,
        LobbyError::PlayerAlreadyCompleted
        | LobbyError::GameAlreadyStarted
        | LobbyError::NotEnoughPlayers
        | LobbyError::GameFull
        | LobbyError::UserAlreadyJoined
        | LobbyError::GameNotJoinable
        | LobbyError::GameNotStarted
        | LobbyError::UsernameTaken => StatusCode::CONFLICT,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            AppError::Lobby(err) => (lobby_status(*err), Some(err.code())),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, None),
            AppError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, None),
            AppError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        let payload = Json(ErrorBody {
            code,
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
