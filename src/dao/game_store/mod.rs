pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    ChallengeEntity, Difficulty, GameEntity, GameStatus, UserEntity,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for lobbies, challenges and users.
///
/// Game writes are compare-and-swap on [`GameEntity::version`]: `save_game` and
/// `delete_game` fail with [`StorageError::VersionConflict`] when the stored
/// aggregate no longer carries `expected_version` (or no longer exists).
///
/// [`StorageError::VersionConflict`]: crate::dao::storage::StorageError::VersionConflict
pub trait GameStore: Send + Sync {
    /// Persist a brand-new game aggregate.
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Replace a game aggregate if its stored version still equals `expected_version`.
    fn save_game(
        &self,
        game: GameEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a game aggregate if its stored version still equals `expected_version`.
    fn delete_game(&self, id: Uuid, expected_version: u64)
    -> BoxFuture<'static, StorageResult<()>>;
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Most recently created pending game with fewer than `capacity` participants.
    fn find_pending_game(
        &self,
        difficulty: Option<Difficulty>,
        capacity: usize,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Most recently created game `user_id` participates in, optionally restricted to `statuses`.
    fn find_game_by_participant(
        &self,
        user_id: Uuid,
        statuses: Option<Vec<GameStatus>>,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Every game `user_id` participates in, most recent first, optionally restricted to `statuses`.
    fn find_games_by_participant(
        &self,
        user_id: Uuid,
        statuses: Option<Vec<GameStatus>>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;
    fn save_challenge(&self, challenge: ChallengeEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_challenge(&self, id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<ChallengeEntity>>>;
    /// Challenges ordered most recent first, optionally filtered by difficulty.
    fn list_challenges(
        &self,
        difficulty: Option<Difficulty>,
    ) -> BoxFuture<'static, StorageResult<Vec<ChallengeEntity>>>;
    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    fn find_user_by_username(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    fn find_users(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
