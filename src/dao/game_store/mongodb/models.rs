use mongodb::bson::{self, DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    ChallengeEntity, Difficulty, GameEntity, GameStatus, ParticipantEntity, ProgrammingLanguage,
    TestCaseEntity, UserEntity,
};

/// Game aggregate as stored in the `games` collection, participants embedded in join order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    status: GameStatus,
    challenge_id: bson::Uuid,
    difficulty: Difficulty,
    created_at: DateTime,
    starts_at: DateTime,
    updated_at: DateTime,
    participants: Vec<MongoParticipantDocument>,
    version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoParticipantDocument {
    id: bson::Uuid,
    user_id: bson::Uuid,
    is_host: bool,
    is_completed: bool,
    completed_at: Option<DateTime>,
    current_code: Option<String>,
    percentage: i32,
    #[serde(default)]
    language: Option<ProgrammingLanguage>,
    joined_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoChallengeDocument {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    title: String,
    description: String,
    difficulty: Difficulty,
    starter_code: String,
    #[serde(default)]
    test_cases: Vec<TestCaseEntity>,
    created_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    username: String,
    created_at: DateTime,
}

impl From<ParticipantEntity> for MongoParticipantDocument {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            id: to_bson_uuid(value.id),
            user_id: to_bson_uuid(value.user_id),
            is_host: value.is_host,
            is_completed: value.is_completed,
            completed_at: value.completed_at.map(DateTime::from_system_time),
            current_code: value.current_code,
            percentage: i32::from(value.percentage),
            language: value.language,
            joined_at: DateTime::from_system_time(value.joined_at),
        }
    }
}

impl From<MongoParticipantDocument> for ParticipantEntity {
    fn from(value: MongoParticipantDocument) -> Self {
        Self {
            id: from_bson_uuid(value.id),
            user_id: from_bson_uuid(value.user_id),
            is_host: value.is_host,
            is_completed: value.is_completed,
            completed_at: value.completed_at.map(DateTime::to_system_time),
            current_code: value.current_code,
            percentage: value.percentage.clamp(0, 100) as u8,
            language: value.language,
            joined_at: value.joined_at.to_system_time(),
        }
    }
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: to_bson_uuid(value.id),
            status: value.status,
            challenge_id: to_bson_uuid(value.challenge_id),
            difficulty: value.difficulty,
            created_at: DateTime::from_system_time(value.created_at),
            starts_at: DateTime::from_system_time(value.starts_at),
            updated_at: DateTime::from_system_time(value.updated_at),
            participants: value.participants.into_values().map(Into::into).collect(),
            version: value.version as i64,
        }
    }
}

impl From<MongoGameDocument> for GameEntity {
    fn from(value: MongoGameDocument) -> Self {
        Self {
            id: from_bson_uuid(value.id),
            status: value.status,
            challenge_id: from_bson_uuid(value.challenge_id),
            difficulty: value.difficulty,
            created_at: value.created_at.to_system_time(),
            starts_at: value.starts_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
            participants: value
                .participants
                .into_iter()
                .map(|doc| {
                    let participant = ParticipantEntity::from(doc);
                    (participant.user_id, participant)
                })
                .collect(),
            version: value.version.max(0) as u64,
        }
    }
}

impl From<ChallengeEntity> for MongoChallengeDocument {
    fn from(value: ChallengeEntity) -> Self {
        Self {
            id: to_bson_uuid(value.id),
            title: value.title,
            description: value.description,
            difficulty: value.difficulty,
            starter_code: value.starter_code,
            test_cases: value.test_cases,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoChallengeDocument> for ChallengeEntity {
    fn from(value: MongoChallengeDocument) -> Self {
        Self {
            id: from_bson_uuid(value.id),
            title: value.title,
            description: value.description,
            difficulty: value.difficulty,
            starter_code: value.starter_code,
            test_cases: value.test_cases,
            created_at: value.created_at.to_system_time(),
        }
    }
}

impl From<UserEntity> for MongoUserDocument {
    fn from(value: UserEntity) -> Self {
        Self {
            id: to_bson_uuid(value.id),
            username: value.username,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoUserDocument> for UserEntity {
    fn from(value: MongoUserDocument) -> Self {
        Self {
            id: from_bson_uuid(value.id),
            username: value.username,
            created_at: value.created_at.to_system_time(),
        }
    }
}

pub fn to_bson_uuid(id: Uuid) -> bson::Uuid {
    bson::Uuid::from_bytes(id.into_bytes())
}

pub fn from_bson_uuid(id: bson::Uuid) -> Uuid {
    Uuid::from_bytes(id.bytes())
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": to_bson_uuid(id)}
}

/// Filter matching a game only while it still carries `version`.
pub fn doc_id_at_version(id: Uuid, version: u64) -> Document {
    doc! {"_id": to_bson_uuid(id), "version": version as i64}
}
