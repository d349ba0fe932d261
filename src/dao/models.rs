use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of a lobby.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    /// Accepting joins.
    Pending,
    /// Challenge running.
    InProgress,
    /// Every participant finished.
    Completed,
    /// Abandoned before completion.
    Cancelled,
}

impl GameStatus {
    /// Wire / storage representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Pending => "PENDING",
            GameStatus::InProgress => "IN_PROGRESS",
            GameStatus::Completed => "COMPLETED",
            GameStatus::Cancelled => "CANCELLED",
        }
    }

    /// Whether the game is still in play (pending or running).
    pub fn is_active(&self) -> bool {
        matches!(self, GameStatus::Pending | GameStatus::InProgress)
    }
}

/// Difficulty tier of a challenge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    /// Warm-up challenges.
    Easy,
    /// Regular challenges.
    Medium,
    /// Hard challenges.
    Hard,
}

impl Difficulty {
    /// Wire / storage representation of the difficulty.
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "EASY",
            Difficulty::Medium => "MEDIUM",
            Difficulty::Hard => "HARD",
        }
    }
}

/// Language a participant wrote their solution in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgrammingLanguage {
    Javascript,
    Typescript,
    Python,
    Java,
    Csharp,
}

/// A single input/expected-output pair used to grade a solution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestCaseEntity {
    /// Raw input fed to the solution.
    pub input: String,
    /// Output the solution must produce.
    pub expected_output: String,
}

/// Challenge definition played inside a lobby.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChallengeEntity {
    /// Stable identifier for the challenge.
    pub id: Uuid,
    /// Short title displayed in the lobby.
    pub title: String,
    /// Problem statement.
    pub description: String,
    /// Difficulty tier used for matchmaking.
    pub difficulty: Difficulty,
    /// Code the editor is pre-filled with.
    pub starter_code: String,
    /// Cases the solution is checked against.
    pub test_cases: Vec<TestCaseEntity>,
    /// Creation timestamp, used for "most recent" lookups.
    pub created_at: SystemTime,
}

/// Player account as seen by the lobby core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Stable identifier for the user.
    pub id: Uuid,
    /// Display name.
    pub username: String,
    /// Registration timestamp.
    pub created_at: SystemTime,
}

/// One player's membership and progress inside a game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Stable identifier for the participant row.
    pub id: Uuid,
    /// User owning this membership.
    pub user_id: Uuid,
    /// Whether this participant may start the game.
    pub is_host: bool,
    /// Whether a solution was submitted.
    pub is_completed: bool,
    /// When the solution was submitted.
    pub completed_at: Option<SystemTime>,
    /// Last submitted code, opaque to the lobby core.
    pub current_code: Option<String>,
    /// Last reported progress (0..=100).
    pub percentage: u8,
    /// Language of the last submission.
    pub language: Option<ProgrammingLanguage>,
    /// When the participant joined.
    pub joined_at: SystemTime,
}

/// Game aggregate persisted by the storage layer.
///
/// The aggregate (game + participants) is the unit of atomic update: every
/// write goes through a compare-and-swap on `version`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Current lifecycle status.
    pub status: GameStatus,
    /// Challenge played in this game, immutable after creation.
    pub challenge_id: Uuid,
    /// Difficulty copied from the challenge so pending lobbies can be filtered.
    pub difficulty: Difficulty,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Scheduled start, overwritten when the game actually starts.
    pub starts_at: SystemTime,
    /// Last time the aggregate was written.
    pub updated_at: SystemTime,
    /// Participants keyed by user id, in join order.
    pub participants: IndexMap<Uuid, ParticipantEntity>,
    /// Optimistic concurrency counter, bumped on every write.
    pub version: u64,
}

impl GameEntity {
    /// Participant currently holding the host flag, if any.
    pub fn host(&self) -> Option<&ParticipantEntity> {
        self.participants.values().find(|participant| participant.is_host)
    }

    /// Whether `user_id` has a participant row in this game.
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains_key(&user_id)
    }
}
