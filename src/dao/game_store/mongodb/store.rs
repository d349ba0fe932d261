use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{Bson, Document, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoChallengeDocument, MongoGameDocument, MongoUserDocument, doc_id, doc_id_at_version,
        to_bson_uuid,
    },
};
use crate::dao::{
    game_store::GameStore,
    models::{ChallengeEntity, Difficulty, GameEntity, GameStatus, UserEntity},
    storage::{StorageError, StorageResult},
};

const GAME_COLLECTION_NAME: &str = "games";
const CHALLENGE_COLLECTION_NAME: &str = "challenges";
const USER_COLLECTION_NAME: &str = "users";

/// MongoDB-backed [`GameStore`]; each game aggregate is a single document.
#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

/// Outcome of a version-guarded write, resolved to a storage error by the caller.
enum GuardedWrite {
    Applied,
    Conflict,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let games = self.games().await;

        let pending_index = mongodb::IndexModel::builder()
            .keys(doc! {"status": 1, "difficulty": 1, "created_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("game_status_idx".to_owned()))
                    .build(),
            )
            .build();
        games
            .create_index(pending_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: GAME_COLLECTION_NAME,
                index: "status,difficulty,created_at",
                source,
            })?;

        let participant_index = mongodb::IndexModel::builder()
            .keys(doc! {"participants.user_id": 1, "created_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("game_participant_idx".to_owned()))
                    .build(),
            )
            .build();
        games
            .create_index(participant_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: GAME_COLLECTION_NAME,
                index: "participants.user_id",
                source,
            })?;

        let challenges = self.challenges().await;
        let difficulty_index = mongodb::IndexModel::builder()
            .keys(doc! {"difficulty": 1, "created_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("challenge_difficulty_idx".to_owned()))
                    .build(),
            )
            .build();
        challenges
            .create_index(difficulty_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: CHALLENGE_COLLECTION_NAME,
                index: "difficulty,created_at",
                source,
            })?;

        let username_index = mongodb::IndexModel::builder()
            .keys(doc! {"username": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("user_username_idx".to_owned()))
                    .build(),
            )
            .build();
        self.users()
            .await
            .create_index(username_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: USER_COLLECTION_NAME,
                index: "username",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn games(&self) -> Collection<MongoGameDocument> {
        self.database()
            .await
            .collection::<MongoGameDocument>(GAME_COLLECTION_NAME)
    }

    async fn challenges(&self) -> Collection<MongoChallengeDocument> {
        self.database()
            .await
            .collection::<MongoChallengeDocument>(CHALLENGE_COLLECTION_NAME)
    }

    async fn users(&self) -> Collection<MongoUserDocument> {
        self.database()
            .await
            .collection::<MongoUserDocument>(USER_COLLECTION_NAME)
    }

    async fn insert_game(&self, game: GameEntity) -> MongoResult<()> {
        let id = game.id;
        let document: MongoGameDocument = game.into();
        self.games()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::SaveGame { id, source })?;
        Ok(())
    }

    async fn save_game(&self, game: GameEntity, expected_version: u64) -> MongoResult<GuardedWrite> {
        let id = game.id;
        let document: MongoGameDocument = game.into();
        let result = self
            .games()
            .await
            .replace_one(doc_id_at_version(id, expected_version), &document)
            .await
            .map_err(|source| MongoDaoError::SaveGame { id, source })?;

        Ok(if result.matched_count == 0 {
            GuardedWrite::Conflict
        } else {
            GuardedWrite::Applied
        })
    }

    async fn delete_game(&self, id: Uuid, expected_version: u64) -> MongoResult<GuardedWrite> {
        let result = self
            .games()
            .await
            .delete_one(doc_id_at_version(id, expected_version))
            .await
            .map_err(|source| MongoDaoError::DeleteGame { id, source })?;

        Ok(if result.deleted_count == 0 {
            GuardedWrite::Conflict
        } else {
            GuardedWrite::Applied
        })
    }

    async fn find_game(&self, id: Uuid) -> MongoResult<Option<GameEntity>> {
        let document = self
            .games()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadGame { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn find_pending_game(
        &self,
        difficulty: Option<Difficulty>,
        capacity: usize,
    ) -> MongoResult<Option<GameEntity>> {
        let mut filter = doc! {"status": GameStatus::Pending.as_str()};
        // A lobby is joinable while the slot at index `capacity - 1` is still empty.
        filter.insert(
            format!("participants.{}", capacity.saturating_sub(1)),
            doc! {"$exists": false},
        );
        if let Some(difficulty) = difficulty {
            filter.insert("difficulty", difficulty.as_str());
        }

        let document = self
            .games()
            .await
            .find_one(filter)
            .sort(doc! {"created_at": -1})
            .await
            .map_err(|source| MongoDaoError::QueryGames { source })?;
        Ok(document.map(Into::into))
    }

    async fn find_game_by_participant(
        &self,
        user_id: Uuid,
        statuses: Option<Vec<GameStatus>>,
    ) -> MongoResult<Option<GameEntity>> {
        let mut filter: Document = doc! {"participants.user_id": to_bson_uuid(user_id)};
        if let Some(statuses) = statuses {
            let allowed = statuses
                .iter()
                .map(|status| Bson::from(status.as_str()))
                .collect::<Vec<_>>();
            filter.insert("status", doc! {"$in": allowed});
        }

        let document = self
            .games()
            .await
            .find_one(filter)
            .sort(doc! {"created_at": -1})
            .await
            .map_err(|source| MongoDaoError::QueryGames { source })?;
        Ok(document.map(Into::into))
    }

    async fn find_games_by_participant(
        &self,
        user_id: Uuid,
        statuses: Option<Vec<GameStatus>>,
    ) -> MongoResult<Vec<GameEntity>> {
        let mut filter: Document = doc! {"participants.user_id": to_bson_uuid(user_id)};
        if let Some(statuses) = statuses {
            let allowed = statuses
                .iter()
                .map(|status| Bson::from(status.as_str()))
                .collect::<Vec<_>>();
            filter.insert("status", doc! {"$in": allowed});
        }

        let documents: Vec<MongoGameDocument> = self
            .games()
            .await
            .find(filter)
            .sort(doc! {"created_at": -1})
            .await
            .map_err(|source| MongoDaoError::QueryGames { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::QueryGames { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn find_user_by_username(&self, username: &str) -> MongoResult<Option<UserEntity>> {
        let document = self
            .users()
            .await
            .find_one(doc! {"username": username})
            .await
            .map_err(|source| MongoDaoError::LoadUsers { source })?;
        Ok(document.map(Into::into))
    }

    async fn save_challenge(&self, challenge: ChallengeEntity) -> MongoResult<()> {
        let id = challenge.id;
        let document: MongoChallengeDocument = challenge.into();
        self.challenges()
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveChallenge { id, source })?;
        Ok(())
    }

    async fn find_challenge(&self, id: Uuid) -> MongoResult<Option<ChallengeEntity>> {
        let document = self
            .challenges()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadChallenges { source })?;
        Ok(document.map(Into::into))
    }

    async fn list_challenges(
        &self,
        difficulty: Option<Difficulty>,
    ) -> MongoResult<Vec<ChallengeEntity>> {
        let filter = match difficulty {
            Some(difficulty) => doc! {"difficulty": difficulty.as_str()},
            None => doc! {},
        };

        let documents: Vec<MongoChallengeDocument> = self
            .challenges()
            .await
            .find(filter)
            .sort(doc! {"created_at": -1})
            .await
            .map_err(|source| MongoDaoError::LoadChallenges { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadChallenges { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_user(&self, user: UserEntity) -> MongoResult<()> {
        let id = user.id;
        let document: MongoUserDocument = user.into();
        self.users()
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveUser { id, source })?;
        Ok(())
    }

    async fn find_users(&self, ids: Vec<Uuid>) -> MongoResult<Vec<UserEntity>> {
        let ids = ids
            .into_iter()
            .map(|id| Bson::from(to_bson_uuid(id)))
            .collect::<Vec<_>>();

        let documents: Vec<MongoUserDocument> = self
            .users()
            .await
            .find(doc! {"_id": {"$in": ids}})
            .await
            .map_err(|source| MongoDaoError::LoadUsers { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadUsers { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }
}

fn guarded(id: Uuid, outcome: MongoResult<GuardedWrite>) -> StorageResult<()> {
    match outcome? {
        GuardedWrite::Applied => Ok(()),
        GuardedWrite::Conflict => Err(StorageError::VersionConflict { id }),
    }
}

impl GameStore for MongoGameStore {
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_game(game).await.map_err(Into::into) })
    }

    fn save_game(
        &self,
        game: GameEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = game.id;
            guarded(id, store.save_game(game, expected_version).await)
        })
    }

    fn delete_game(
        &self,
        id: Uuid,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { guarded(id, store.delete_game(id, expected_version).await) })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(id).await.map_err(Into::into) })
    }

    fn find_pending_game(
        &self,
        difficulty: Option<Difficulty>,
        capacity: usize,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_pending_game(difficulty, capacity)
                .await
                .map_err(Into::into)
        })
    }

    fn find_game_by_participant(
        &self,
        user_id: Uuid,
        statuses: Option<Vec<GameStatus>>,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_game_by_participant(user_id, statuses)
                .await
                .map_err(Into::into)
        })
    }

    fn find_games_by_participant(
        &self,
        user_id: Uuid,
        statuses: Option<Vec<GameStatus>>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_games_by_participant(user_id, statuses)
                .await
                .map_err(Into::into)
        })
    }

    fn save_challenge(&self, challenge: ChallengeEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_challenge(challenge).await.map_err(Into::into) })
    }

    fn find_challenge(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ChallengeEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_challenge(id).await.map_err(Into::into) })
    }

    fn list_challenges(
        &self,
        difficulty: Option<Difficulty>,
    ) -> BoxFuture<'static, StorageResult<Vec<ChallengeEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_challenges(difficulty).await.map_err(Into::into) })
    }

    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_user(user).await.map_err(Into::into) })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let users = store.find_users(vec![id]).await?;
            Ok(users.into_iter().next())
        })
    }

    fn find_user_by_username(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_user_by_username(&username)
                .await
                .map_err(Into::into)
        })
    }

    fn find_users(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_users(ids).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
