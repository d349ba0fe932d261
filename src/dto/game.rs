use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    dao::models::{
        ChallengeEntity, Difficulty, GameEntity, GameStatus, ParticipantEntity,
        ProgrammingLanguage, TestCaseEntity, UserEntity,
    },
    dto::format_system_time,
};

/// Username shown for participants whose user record could not be loaded.
pub const UNKNOWN_USERNAME: &str = "unknown";

/// Query accepted by `POST /game`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct JoinGameQuery {
    /// Restrict matchmaking to lobbies of this difficulty.
    pub difficulty: Option<Difficulty>,
}

/// Full denormalized view of a game sent to clients.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub id: Uuid,
    pub status: GameStatus,
    pub created_at: String,
    pub starts_at: String,
    /// Aggregate version the snapshot was read at.
    pub version: u64,
    pub challenge: ChallengeSnapshot,
    /// Participants in join order.
    pub participants: Vec<ParticipantSnapshot>,
}

/// Participant projection embedded in a [`GameSnapshot`].
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSnapshot {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub is_host: bool,
    pub is_completed: bool,
    pub completed_at: Option<String>,
    pub current_code: Option<String>,
    pub percentage: u8,
    pub language: Option<ProgrammingLanguage>,
    pub joined_at: String,
}

/// Challenge projection embedded in a [`GameSnapshot`].
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeSnapshot {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub starter_code: String,
    pub test_cases: Vec<TestCaseSnapshot>,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseSnapshot {
    pub input: String,
    pub expected_output: String,
}

impl From<&TestCaseEntity> for TestCaseSnapshot {
    fn from(value: &TestCaseEntity) -> Self {
        Self {
            input: value.input.clone(),
            expected_output: value.expected_output.clone(),
        }
    }
}

impl From<&ChallengeEntity> for ChallengeSnapshot {
    fn from(value: &ChallengeEntity) -> Self {
        Self {
            id: value.id,
            title: value.title.clone(),
            description: value.description.clone(),
            difficulty: value.difficulty,
            starter_code: value.starter_code.clone(),
            test_cases: value.test_cases.iter().map(Into::into).collect(),
        }
    }
}

impl ParticipantSnapshot {
    fn from_entity(participant: &ParticipantEntity, username: String) -> Self {
        Self {
            id: participant.id,
            user_id: participant.user_id,
            username,
            is_host: participant.is_host,
            is_completed: participant.is_completed,
            completed_at: participant.completed_at.map(format_system_time),
            current_code: participant.current_code.clone(),
            percentage: participant.percentage,
            language: participant.language,
            joined_at: format_system_time(participant.joined_at),
        }
    }
}

impl GameSnapshot {
    /// Assemble a snapshot from a game aggregate, its challenge and the participants' users.
    pub fn build(
        game: &GameEntity,
        challenge: &ChallengeEntity,
        users: &HashMap<Uuid, UserEntity>,
    ) -> Self {
        let participants = game
            .participants
            .values()
            .map(|participant| {
                let username = users
                    .get(&participant.user_id)
                    .map(|user| user.username.clone())
                    .unwrap_or_else(|| UNKNOWN_USERNAME.to_owned());
                ParticipantSnapshot::from_entity(participant, username)
            })
            .collect();

        Self {
            id: game.id,
            status: game.status,
            created_at: format_system_time(game.created_at),
            starts_at: format_system_time(game.starts_at),
            version: game.version,
            challenge: challenge.into(),
            participants,
        }
    }

    pub fn participant(&self, user_id: Uuid) -> Option<&ParticipantSnapshot> {
        self.participants
            .iter()
            .find(|participant| participant.user_id == user_id)
    }
}
