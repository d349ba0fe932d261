//! Lobby manager: matchmaking, start, submissions and departures.
//!
//! Every mutation is a read-decide-write cycle against the game aggregate,
//! committed with a compare-and-swap on its version and retried from a fresh
//! read when a concurrent writer got there first.

use std::{collections::HashMap, sync::Arc, time::SystemTime};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::LobbySettings,
    dao::{
        game_store::GameStore,
        models::{Difficulty, GameEntity, GameStatus},
        storage::StorageError,
    },
    dto::game::GameSnapshot,
    error::ServiceError,
    services::challenge_service,
    state::{
        SharedState,
        lobby::{self, DepartOutcome, LobbyError, StartOutcome, SubmitOutcome, Submission},
    },
};

/// Result of a committed mutation.
struct Committed<T> {
    value: T,
    /// Aggregate as stored after the commit; `None` once the game was deleted.
    game: Option<GameEntity>,
}

/// Apply `decide` to the latest stored version of `game_id` and commit it atomically.
///
/// A game left without participants is deleted instead of saved. Aggregates
/// that `decide` leaves untouched are not rewritten.
async fn mutate_game<T, F>(
    store: &Arc<dyn GameStore>,
    attempts: u32,
    game_id: Uuid,
    mut decide: F,
) -> Result<Committed<T>, ServiceError>
where
    F: FnMut(&mut GameEntity) -> Result<T, LobbyError>,
{
    for attempt in 1..=attempts {
        let Some(original) = store.find_game(game_id).await? else {
            return Err(LobbyError::GameNotFound.into());
        };
        let expected = original.version;
        let mut game = original.clone();
        let value = decide(&mut game)?;

        if game == original {
            return Ok(Committed {
                value,
                game: Some(original),
            });
        }

        let write = if game.participants.is_empty() {
            store
                .delete_game(game_id, expected)
                .await
                .map(|()| None)
        } else {
            game.version = expected + 1;
            game.updated_at = SystemTime::now();
            store
                .save_game(game.clone(), expected)
                .await
                .map(|()| Some(game))
        };

        match write {
            Ok(game) => return Ok(Committed { value, game }),
            Err(StorageError::VersionConflict { .. }) => {
                debug!(%game_id, attempt, "lost compare-and-swap; retrying from a fresh read");
                tokio::task::yield_now().await;
            }
            Err(err) => return Err(err.into()),
        }
    }

    warn!(%game_id, attempts, "giving up on contended game");
    Err(ServiceError::Contention { game_id, attempts })
}

/// Put `user_id` into a pending lobby, creating one when none can take them.
///
/// A user already waiting in a pending lobby gets that lobby back unchanged.
pub async fn join_or_create_game(
    state: &SharedState,
    user_id: Uuid,
    difficulty: Option<Difficulty>,
) -> Result<GameSnapshot, ServiceError> {
    let store = state.require_game_store().await?;
    let settings = state.config().lobby().clone();

    if store.find_user(user_id).await?.is_none() {
        return Err(LobbyError::UserNotFound.into());
    }

    if let Some(existing) = store
        .find_game_by_participant(user_id, Some(vec![GameStatus::Pending]))
        .await?
    {
        debug!(%user_id, game_id = %existing.id, "user already waiting in a lobby");
        return build_snapshot(&store, &existing).await;
    }

    let placed = place_user(&store, &settings, user_id, difficulty).await?;
    let game = settle_membership(&store, settings.commit_attempts, user_id, placed).await?;
    build_snapshot(&store, &game).await
}

async fn place_user(
    store: &Arc<dyn GameStore>,
    settings: &LobbySettings,
    user_id: Uuid,
    difficulty: Option<Difficulty>,
) -> Result<GameEntity, ServiceError> {
    for _ in 0..settings.commit_attempts {
        let Some(candidate) = store
            .find_pending_game(difficulty, settings.max_lobby_size)
            .await?
        else {
            break;
        };

        let admitted = admit_into(
            store,
            settings.commit_attempts,
            candidate.id,
            user_id,
            settings.max_lobby_size,
        )
        .await;
        match admitted {
            Ok(game) => {
                info!(
                    %user_id,
                    game_id = %game.id,
                    players = game.participants.len(),
                    "user joined lobby"
                );
                return Ok(game);
            }
            Err(ServiceError::Lobby(
                LobbyError::GameFull | LobbyError::GameNotJoinable | LobbyError::GameNotFound,
            )) => {
                debug!(%user_id, game_id = %candidate.id, "lobby filled up or closed; looking again");
            }
            Err(ServiceError::Lobby(LobbyError::UserAlreadyJoined)) => {
                return store
                    .find_game(candidate.id)
                    .await?
                    .ok_or_else(|| LobbyError::GameNotFound.into());
            }
            Err(err) => return Err(err),
        }
    }

    let challenge = challenge_service::pick_challenge(store.as_ref(), difficulty).await?;
    let game = lobby::new_game(&challenge, user_id, SystemTime::now(), settings.start_grace);
    store.insert_game(game.clone()).await?;
    info!(
        %user_id,
        game_id = %game.id,
        challenge_id = %challenge.id,
        difficulty = challenge.difficulty.as_str(),
        "created lobby"
    );
    Ok(game)
}

/// Leave `user_id` in exactly one pending lobby after a placement.
///
/// Concurrent requests from the same user can each place them. The earliest
/// created lobby (ties broken by id) is kept and the others are withdrawn from.
async fn settle_membership(
    store: &Arc<dyn GameStore>,
    attempts: u32,
    user_id: Uuid,
    placed: GameEntity,
) -> Result<GameEntity, ServiceError> {
    let mut pending = store
        .find_games_by_participant(user_id, Some(vec![GameStatus::Pending]))
        .await?;
    if pending.len() < 2 {
        return Ok(pending.pop().unwrap_or(placed));
    }

    pending.sort_by_key(|game| (game.created_at, game.id));
    let mut lobbies = pending.into_iter();
    let Some(kept) = lobbies.next() else {
        return Ok(placed);
    };

    for duplicate in lobbies {
        let withdrawn = mutate_game(store, attempts, duplicate.id, |game| {
            if game.status != GameStatus::Pending {
                return Err(LobbyError::GameNotJoinable);
            }
            lobby::depart(game, user_id)
        })
        .await;
        match withdrawn {
            Ok(_) => info!(
                %user_id,
                kept = %kept.id,
                withdrawn = %duplicate.id,
                "withdrew duplicate lobby placement"
            ),
            Err(ServiceError::Lobby(
                LobbyError::GameNotFound | LobbyError::PlayerNotInGame | LobbyError::GameNotJoinable,
            )) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(kept)
}

/// Admit `user_id` into a specific pending lobby.
pub async fn join_game(
    state: &SharedState,
    game_id: Uuid,
    user_id: Uuid,
) -> Result<GameSnapshot, ServiceError> {
    let store = state.require_game_store().await?;
    let settings = state.config().lobby().clone();
    let game = admit_into(
        &store,
        settings.commit_attempts,
        game_id,
        user_id,
        settings.max_lobby_size,
    )
    .await?;
    info!(%user_id, %game_id, players = game.participants.len(), "user joined lobby");
    build_snapshot(&store, &game).await
}

async fn admit_into(
    store: &Arc<dyn GameStore>,
    attempts: u32,
    game_id: Uuid,
    user_id: Uuid,
    capacity: usize,
) -> Result<GameEntity, ServiceError> {
    let committed = mutate_game(store, attempts, game_id, |game| {
        lobby::admit(game, user_id, capacity, SystemTime::now())
    })
    .await?;
    committed
        .game
        .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}` vanished after join")))
}

/// Snapshot of a live game `user_id` participates in.
pub async fn find_game(
    state: &SharedState,
    game_id: Uuid,
    user_id: Uuid,
) -> Result<GameSnapshot, ServiceError> {
    let store = state.require_game_store().await?;
    let game = store
        .find_game(game_id)
        .await?
        .filter(|game| game.status.is_active())
        .ok_or(LobbyError::GameNotFound)?;
    if !game.has_participant(user_id) {
        return Err(LobbyError::PlayerNotInGame.into());
    }
    build_snapshot(&store, &game).await
}

/// Snapshot of the most recent game `user_id` participates in, whatever its status.
pub async fn find_game_by_user_id(
    state: &SharedState,
    user_id: Uuid,
) -> Result<GameSnapshot, ServiceError> {
    let store = state.require_game_store().await?;
    let game = store
        .find_game_by_participant(user_id, None)
        .await?
        .ok_or(LobbyError::GameNotFound)?;
    build_snapshot(&store, &game).await
}

/// Move a pending lobby to in progress. Starting a running lobby changes nothing.
pub async fn start_game(state: &SharedState, game_id: Uuid) -> Result<GameSnapshot, ServiceError> {
    let store = state.require_game_store().await?;
    let attempts = state.config().lobby().commit_attempts;
    let committed = mutate_game(&store, attempts, game_id, |game| {
        lobby::start(game, SystemTime::now())
    })
    .await?;
    let game = committed
        .game
        .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}` vanished after start")))?;

    match committed.value {
        StartOutcome::Started => {
            info!(%game_id, players = game.participants.len(), "lobby started")
        }
        StartOutcome::AlreadyRunning => debug!(%game_id, "start requested on a running lobby"),
    }
    build_snapshot(&store, &game).await
}

/// Record `user_id`'s submission and complete the game once everyone is done.
pub async fn submit_code(
    state: &SharedState,
    game_id: Uuid,
    user_id: Uuid,
    submission: Submission,
) -> Result<SubmitOutcome, ServiceError> {
    let store = state.require_game_store().await?;
    let settings = state.config().lobby().clone();
    if submission.code.len() > settings.max_code_bytes {
        return Err(ServiceError::InvalidInput(format!(
            "code exceeds {} bytes",
            settings.max_code_bytes
        )));
    }

    let committed = mutate_game(&store, settings.commit_attempts, game_id, |game| {
        lobby::submit(game, user_id, submission.clone(), SystemTime::now())
    })
    .await?;

    info!(
        %game_id,
        %user_id,
        progress = submission.progress,
        language = ?submission.language,
        "submission recorded"
    );
    if committed.value.game_completed {
        info!(%game_id, "every participant finished; game completed");
    }
    Ok(committed.value)
}

/// Remove `user_id` from the game, deleting it when they were the last participant.
pub async fn leave_game(
    state: &SharedState,
    game_id: Uuid,
    user_id: Uuid,
) -> Result<DepartOutcome, ServiceError> {
    let store = state.require_game_store().await?;
    let attempts = state.config().lobby().commit_attempts;
    let committed = mutate_game(&store, attempts, game_id, |game| lobby::depart(game, user_id)).await?;

    match committed.value {
        DepartOutcome::LastPlayerLeft => info!(%game_id, %user_id, "last player left; game deleted"),
        DepartOutcome::Remaining {
            new_host,
            game_completed,
        } => {
            info!(%game_id, %user_id, "player left game");
            if let Some(host) = new_host {
                info!(%game_id, new_host = %host, "host reassigned");
            }
            if game_completed {
                info!(%game_id, "remaining participants all finished; game completed");
            }
        }
    }
    Ok(committed.value)
}

/// Freshly read snapshot of `game_id` without membership checks, `None` once deleted.
pub async fn game_snapshot(
    state: &SharedState,
    game_id: Uuid,
) -> Result<Option<GameSnapshot>, ServiceError> {
    let store = state.require_game_store().await?;
    match store.find_game(game_id).await? {
        Some(game) => build_snapshot(&store, &game).await.map(Some),
        None => Ok(None),
    }
}

async fn build_snapshot(
    store: &Arc<dyn GameStore>,
    game: &GameEntity,
) -> Result<GameSnapshot, ServiceError> {
    let challenge = store
        .find_challenge(game.challenge_id)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "challenge `{}` of game `{}` not found",
                game.challenge_id, game.id
            ))
        })?;

    let users = store
        .find_users(game.participants.keys().copied().collect())
        .await?
        .into_iter()
        .map(|user| (user.id, user))
        .collect::<HashMap<_, _>>();
    for user_id in game.participants.keys().filter(|id| !users.contains_key(id)) {
        warn!(game_id = %game.id, %user_id, "participant user record missing");
    }

    Ok(GameSnapshot::build(game, &challenge, &users))
}
