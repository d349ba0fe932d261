use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use thiserror::Error;
use uuid::Uuid;

use crate::dao::{
    game_store::GameStore,
    models::{ChallengeEntity, Difficulty, GameEntity, GameStatus, UserEntity},
    storage::{StorageError, StorageResult},
};

/// Raised by every operation while the store is switched offline.
#[derive(Debug, Error)]
#[error("in-memory store is offline")]
pub struct MemoryStoreOffline;

/// Process-local [`GameStore`] used for tests and single-instance deployments.
///
/// Each game lives in its own `DashMap` entry, so the version check and the
/// replacement happen under the same shard lock.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    games: DashMap<Uuid, GameEntity>,
    challenges: DashMap<Uuid, ChallengeEntity>,
    users: DashMap<Uuid, UserEntity>,
    offline: AtomicBool,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a lost backend: every call fails with [`StorageError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "in-memory store is offline".into(),
                MemoryStoreOffline,
            ));
        }
        Ok(())
    }

    fn insert_game(&self, game: GameEntity) -> StorageResult<()> {
        self.ensure_online()?;
        self.inner.games.insert(game.id, game);
        Ok(())
    }

    fn save_game(&self, game: GameEntity, expected_version: u64) -> StorageResult<()> {
        self.ensure_online()?;
        let id = game.id;
        match self.inner.games.get_mut(&id) {
            Some(mut stored) if stored.version == expected_version => {
                *stored = game;
                Ok(())
            }
            _ => Err(StorageError::VersionConflict { id }),
        }
    }

    fn delete_game(&self, id: Uuid, expected_version: u64) -> StorageResult<()> {
        self.ensure_online()?;
        self.inner
            .games
            .remove_if(&id, |_, stored| stored.version == expected_version)
            .map(|_| ())
            .ok_or(StorageError::VersionConflict { id })
    }

    fn find_game(&self, id: Uuid) -> StorageResult<Option<GameEntity>> {
        self.ensure_online()?;
        Ok(self.inner.games.get(&id).map(|entry| entry.value().clone()))
    }

    fn find_pending_game(
        &self,
        difficulty: Option<Difficulty>,
        capacity: usize,
    ) -> StorageResult<Option<GameEntity>> {
        self.ensure_online()?;
        Ok(self
            .inner
            .games
            .iter()
            .filter(|entry| {
                let game = entry.value();
                game.status == GameStatus::Pending
                    && game.participants.len() < capacity
                    && difficulty.is_none_or(|wanted| game.difficulty == wanted)
            })
            .max_by_key(|entry| entry.value().created_at)
            .map(|entry| entry.value().clone()))
    }

    fn find_games_by_participant(
        &self,
        user_id: Uuid,
        statuses: Option<Vec<GameStatus>>,
    ) -> StorageResult<Vec<GameEntity>> {
        self.ensure_online()?;
        let mut games = self
            .inner
            .games
            .iter()
            .filter(|entry| {
                let game = entry.value();
                game.has_participant(user_id)
                    && statuses
                        .as_ref()
                        .is_none_or(|allowed| allowed.contains(&game.status))
            })
            .map(|entry| entry.value().clone())
            .collect::<Vec<_>>();
        games.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(games)
    }

    fn list_challenges(&self, difficulty: Option<Difficulty>) -> StorageResult<Vec<ChallengeEntity>> {
        self.ensure_online()?;
        let mut challenges = self
            .inner
            .challenges
            .iter()
            .filter(|entry| difficulty.is_none_or(|wanted| entry.value().difficulty == wanted))
            .map(|entry| entry.value().clone())
            .collect::<Vec<_>>();
        challenges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(challenges)
    }

    fn find_users(&self, ids: &[Uuid]) -> StorageResult<Vec<UserEntity>> {
        self.ensure_online()?;
        Ok(ids
            .iter()
            .filter_map(|id| self.inner.users.get(id).map(|entry| entry.value().clone()))
            .collect())
    }
}

impl GameStore for MemoryGameStore {
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = MemoryGameStore::insert_game(self, game);
        Box::pin(async move { result })
    }

    fn save_game(
        &self,
        game: GameEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = MemoryGameStore::save_game(self, game, expected_version);
        Box::pin(async move { result })
    }

    fn delete_game(
        &self,
        id: Uuid,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = MemoryGameStore::delete_game(self, id, expected_version);
        Box::pin(async move { result })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let result = MemoryGameStore::find_game(self, id);
        Box::pin(async move { result })
    }

    fn find_pending_game(
        &self,
        difficulty: Option<Difficulty>,
        capacity: usize,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let result = MemoryGameStore::find_pending_game(self, difficulty, capacity);
        Box::pin(async move { result })
    }

    fn find_game_by_participant(
        &self,
        user_id: Uuid,
        statuses: Option<Vec<GameStatus>>,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let result = MemoryGameStore::find_games_by_participant(self, user_id, statuses)
            .map(|games| games.into_iter().next());
        Box::pin(async move { result })
    }

    fn find_games_by_participant(
        &self,
        user_id: Uuid,
        statuses: Option<Vec<GameStatus>>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let result = MemoryGameStore::find_games_by_participant(self, user_id, statuses);
        Box::pin(async move { result })
    }

    fn save_challenge(&self, challenge: ChallengeEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.ensure_online().map(|()| {
            self.inner.challenges.insert(challenge.id, challenge);
        });
        Box::pin(async move { result })
    }

    fn find_challenge(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ChallengeEntity>>> {
        let result = self
            .ensure_online()
            .map(|()| self.inner.challenges.get(&id).map(|entry| entry.value().clone()));
        Box::pin(async move { result })
    }

    fn list_challenges(
        &self,
        difficulty: Option<Difficulty>,
    ) -> BoxFuture<'static, StorageResult<Vec<ChallengeEntity>>> {
        let result = MemoryGameStore::list_challenges(self, difficulty);
        Box::pin(async move { result })
    }

    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.ensure_online().map(|()| {
            self.inner.users.insert(user.id, user);
        });
        Box::pin(async move { result })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let result = self
            .ensure_online()
            .map(|()| self.inner.users.get(&id).map(|entry| entry.value().clone()));
        Box::pin(async move { result })
    }

    fn find_user_by_username(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let result = self.ensure_online().map(|()| {
            self.inner
                .users
                .iter()
                .find(|entry| entry.value().username == username)
                .map(|entry| entry.value().clone())
        });
        Box::pin(async move { result })
    }

    fn find_users(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let result = MemoryGameStore::find_users(self, &ids);
        Box::pin(async move { result })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.ensure_online();
        Box::pin(async move { result })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.ensure_online();
        Box::pin(async move { result })
    }
}
