use std::{collections::HashSet, time::SystemTime};

use rand::seq::IndexedRandom;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::ChallengeSeed,
    dao::{
        game_store::GameStore,
        models::{ChallengeEntity, Difficulty},
        storage::StorageResult,
    },
    error::ServiceError,
    state::lobby::LobbyError,
};

/// Pick a challenge uniformly among every stored challenge.
pub async fn random_challenge(store: &dyn GameStore) -> Result<ChallengeEntity, ServiceError> {
    let challenges = store.list_challenges(None).await?;
    challenges
        .choose(&mut rand::rng())
        .cloned()
        .ok_or(ServiceError::Lobby(LobbyError::NoChallengeAvailable))
}

/// Most recently created challenge of `difficulty`, if any.
pub async fn challenge_by_difficulty(
    store: &dyn GameStore,
    difficulty: Difficulty,
) -> Result<Option<ChallengeEntity>, ServiceError> {
    let challenges = store.list_challenges(Some(difficulty)).await?;
    Ok(challenges.into_iter().next())
}

/// Challenge for a new lobby: the requested difficulty when available, otherwise any.
pub async fn pick_challenge(
    store: &dyn GameStore,
    difficulty: Option<Difficulty>,
) -> Result<ChallengeEntity, ServiceError> {
    if let Some(difficulty) = difficulty {
        if let Some(challenge) = challenge_by_difficulty(store, difficulty).await? {
            return Ok(challenge);
        }
        debug!(difficulty = difficulty.as_str(), "no challenge for difficulty; picking any");
    }
    random_challenge(store).await
}

/// Insert every seed whose title is not stored yet. Returns how many were added.
pub async fn seed_catalog(store: &dyn GameStore, seeds: &[ChallengeSeed]) -> StorageResult<usize> {
    let existing = store
        .list_challenges(None)
        .await?
        .into_iter()
        .map(|challenge| challenge.title)
        .collect::<HashSet<_>>();

    let mut inserted = 0;
    for seed in seeds.iter().filter(|seed| !existing.contains(&seed.title)) {
        store
            .save_challenge(ChallengeEntity {
                id: Uuid::new_v4(),
                title: seed.title.clone(),
                description: seed.description.clone(),
                difficulty: seed.difficulty,
                starter_code: seed.starter_code.clone(),
                test_cases: seed.test_cases.iter().cloned().map(Into::into).collect(),
                created_at: SystemTime::now(),
            })
            .await?;
        inserted += 1;
    }

    if inserted > 0 {
        info!(inserted, "seeded challenge catalog");
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use crate::{config::AppConfig, dao::game_store::memory::MemoryGameStore};

    use super::*;

    #[tokio::test]
    async fn empty_catalog_has_no_challenge() {
        let store = MemoryGameStore::new();
        let err = random_challenge(&store).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Lobby(LobbyError::NoChallengeAvailable)
        ));
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let store = MemoryGameStore::new();
        let config = AppConfig::default();
        let first = seed_catalog(&store, config.challenges()).await.unwrap();
        assert_eq!(first, config.challenges().len());
        assert_eq!(seed_catalog(&store, config.challenges()).await.unwrap(), 0);
        assert!(random_challenge(&store).await.is_ok());
    }

    #[tokio::test]
    async fn difficulty_falls_back_to_any_challenge() {
        let store = MemoryGameStore::new();
        let config = AppConfig::default();
        let easy_only = config
            .challenges()
            .iter()
            .filter(|seed| seed.difficulty == Difficulty::Easy)
            .cloned()
            .collect::<Vec<_>>();
        seed_catalog(&store, &easy_only).await.unwrap();

        let easy = pick_challenge(&store, Some(Difficulty::Easy)).await.unwrap();
        assert_eq!(easy.difficulty, Difficulty::Easy);
        assert!(
            challenge_by_difficulty(&store, Difficulty::Hard)
                .await
                .unwrap()
                .is_none()
        );
        let fallback = pick_challenge(&store, Some(Difficulty::Hard)).await.unwrap();
        assert_eq!(fallback.difficulty, Difficulty::Easy);
    }
}
