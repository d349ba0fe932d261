use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{dao::models::ProgrammingLanguage, dto::game::GameSnapshot};

/// Code sent back when an inbound frame cannot be understood.
pub const INVALID_MESSAGE_CODE: &str = "INVALID_MESSAGE";

/// Progress assumed when a submission does not report one.
const DEFAULT_PROGRESS: i64 = 100;

/// Identity claimed by a client while opening the realtime socket.
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct HandshakeParams {
    /// Claimed user identity.
    pub user_id: Option<Uuid>,
    /// Game the client expects to be in; resolved from the user when omitted.
    pub game_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema, PartialEq, Eq)]
/// Intents accepted from lobby WebSocket clients.
#[serde(tag = "event")]
pub enum ClientIntent {
    #[serde(rename = "submit")]
    Submit {
        #[serde(default)]
        code: String,
        #[serde(default = "default_progress")]
        progress: i64,
        #[serde(default)]
        language: Option<ProgrammingLanguage>,
    },
    #[serde(rename = "startGame")]
    StartGame,
    #[serde(rename = "leave")]
    Leave,
    #[serde(other)]
    Unknown,
}

fn default_progress() -> i64 {
    DEFAULT_PROGRESS
}

impl ClientIntent {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Clamp a reported progress value into the 0..=100 range.
pub fn clamp_progress(progress: i64) -> u8 {
    progress.clamp(0, 100) as u8
}

#[derive(Debug, Serialize, ToSchema)]
/// Frames pushed to lobby WebSocket clients.
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    /// Full lobby snapshot broadcast to the room.
    #[serde(rename = "gameState")]
    GameState(GameSnapshot),
    /// Snapshot broadcast when the lobby transitions to in progress.
    #[serde(rename = "startGame")]
    StartGame(GameSnapshot),
    /// Failure sent privately to the requesting connection.
    #[serde(rename = "error")]
    Error(ErrorPayload),
}

/// Error payload; `code` is omitted for infrastructure failures.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct ErrorPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

impl ErrorPayload {
    pub fn coded(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self {
            code: None,
            message: "Internal server error".into(),
        }
    }
}
