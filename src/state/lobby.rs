//! Lobby rules applied to a [`GameEntity`] aggregate.
//!
//! Every function here is pure: it inspects and mutates an in-memory aggregate
//! and reports business failures as [`LobbyError`]. Persisting the result
//! atomically is the job of the lobby service.

use std::time::{Duration, SystemTime};

use indexmap::IndexMap;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::models::{ChallengeEntity, GameEntity, GameStatus, ParticipantEntity, ProgrammingLanguage},
    state::state_machine::{LobbyEvent, next_status},
};

/// Minimum number of participants required to start a lobby.
pub const MIN_PLAYERS_TO_START: usize = 2;

/// Expected business failures. These are results, never crashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LobbyError {
    #[error("Game not found")]
    GameNotFound,
    #[error("Player not in game")]
    PlayerNotInGame,
    #[error("Player already completed the game")]
    PlayerAlreadyCompleted,
    #[error("Game already started")]
    GameAlreadyStarted,
    #[error("Not enough players to start the game")]
    NotEnoughPlayers,
    #[error("Game is full")]
    GameFull,
    #[error("User already joined this game")]
    UserAlreadyJoined,
    #[error("Game is not accepting players")]
    GameNotJoinable,
    #[error("Game has not started yet")]
    GameNotStarted,
    #[error("Only the host can start the game")]
    PlayerNotHost,
    #[error("User not found")]
    UserNotFound,
    #[error("No challenges available")]
    NoChallengeAvailable,
    #[error("Username is already taken")]
    UsernameTaken,
}

impl LobbyError {
    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            LobbyError::GameNotFound => "GAME_NOT_FOUND",
            LobbyError::PlayerNotInGame => "PLAYER_NOT_IN_GAME",
            LobbyError::PlayerAlreadyCompleted => "PLAYER_ALREADY_COMPLETED",
            LobbyError::GameAlreadyStarted => "GAME_ALREADY_STARTED",
            LobbyError::NotEnoughPlayers => "NOT_ENOUGH_PLAYERS",
            LobbyError::GameFull => "GAME_FULL",
            LobbyError::UserAlreadyJoined => "USER_ALREADY_JOINED",
            LobbyError::GameNotJoinable => "GAME_NOT_JOINABLE",
            LobbyError::GameNotStarted => "GAME_NOT_STARTED",
            LobbyError::PlayerNotHost => "PLAYER_NOT_HOST",
            LobbyError::UserNotFound => "USER_NOT_FOUND",
            LobbyError::NoChallengeAvailable => "NO_CHALLENGE_AVAILABLE",
            LobbyError::UsernameTaken => "USERNAME_TAKEN",
        }
    }
}

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The lobby moved from pending to in progress.
    Started,
    /// The lobby was already running; nothing changed.
    AlreadyRunning,
}

/// Result of a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Whether this submission completed the whole game.
    pub game_completed: bool,
}

/// Result of a successful departure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartOutcome {
    /// The leaver was the last participant; the lobby must be removed.
    LastPlayerLeft,
    /// Other participants remain.
    Remaining {
        /// User promoted to host when the leaver held the flag.
        new_host: Option<Uuid>,
        /// Whether the departure left only finished players behind.
        game_completed: bool,
    },
}

/// One participant's solution. The code is opaque to the lobby rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Reported progress, capped at 100.
    pub progress: u8,
    pub code: String,
    pub language: Option<ProgrammingLanguage>,
}

impl Submission {
    pub fn new(progress: u8, code: impl Into<String>) -> Self {
        Self {
            progress,
            code: code.into(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: Option<ProgrammingLanguage>) -> Self {
        self.language = language;
        self
    }
}

/// Build a fresh pending lobby for `challenge` with `host` as its only participant.
pub fn new_game(
    challenge: &ChallengeEntity,
    host: Uuid,
    now: SystemTime,
    start_grace: Duration,
) -> GameEntity {
    let mut participants = IndexMap::new();
    participants.insert(host, new_participant(host, true, now));

    GameEntity {
        id: Uuid::new_v4(),
        status: GameStatus::Pending,
        challenge_id: challenge.id,
        difficulty: challenge.difficulty,
        created_at: now,
        starts_at: now + start_grace,
        updated_at: now,
        participants,
        version: 0,
    }
}

fn new_participant(user_id: Uuid, is_host: bool, now: SystemTime) -> ParticipantEntity {
    ParticipantEntity {
        id: Uuid::new_v4(),
        user_id,
        is_host,
        is_completed: false,
        completed_at: None,
        current_code: None,
        percentage: 0,
        language: None,
        joined_at: now,
    }
}

/// Admit `user_id` into a pending lobby holding at most `capacity` players.
///
/// The first participant of an empty lobby becomes host.
pub fn admit(
    game: &mut GameEntity,
    user_id: Uuid,
    capacity: usize,
    now: SystemTime,
) -> Result<(), LobbyError> {
    if game.status != GameStatus::Pending {
        return Err(LobbyError::GameNotJoinable);
    }
    if game.has_participant(user_id) {
        return Err(LobbyError::UserAlreadyJoined);
    }
    if game.participants.len() >= capacity {
        return Err(LobbyError::GameFull);
    }

    let is_host = game.participants.is_empty();
    game.participants
        .insert(user_id, new_participant(user_id, is_host, now));
    Ok(())
}

/// Guard shared by the realtime gateway and [`start`]: pending with enough players.
pub fn check_startable(status: GameStatus, participant_count: usize) -> Result<(), LobbyError> {
    if status != GameStatus::Pending {
        return Err(LobbyError::GameAlreadyStarted);
    }
    if participant_count < MIN_PLAYERS_TO_START {
        return Err(LobbyError::NotEnoughPlayers);
    }
    Ok(())
}

/// Move a pending lobby to in progress and stamp the actual start time.
///
/// Starting a lobby that is already running is a no-op.
pub fn start(game: &mut GameEntity, now: SystemTime) -> Result<StartOutcome, LobbyError> {
    if game.status == GameStatus::InProgress {
        return Ok(StartOutcome::AlreadyRunning);
    }
    check_startable(game.status, game.participants.len())?;

    game.status =
        next_status(game.status, LobbyEvent::Start).map_err(|_| LobbyError::GameAlreadyStarted)?;
    game.starts_at = now;
    Ok(StartOutcome::Started)
}

/// Record a submission for `user_id` and complete the game once everyone is done.
pub fn submit(
    game: &mut GameEntity,
    user_id: Uuid,
    submission: Submission,
    now: SystemTime,
) -> Result<SubmitOutcome, LobbyError> {
    let status = game.status;
    let participant = game
        .participants
        .get_mut(&user_id)
        .ok_or(LobbyError::PlayerNotInGame)?;
    if participant.is_completed {
        return Err(LobbyError::PlayerAlreadyCompleted);
    }
    if status != GameStatus::InProgress {
        return Err(LobbyError::GameNotStarted);
    }

    participant.is_completed = true;
    participant.completed_at = Some(now);
    participant.current_code = Some(submission.code);
    participant.percentage = submission.progress.min(100);
    if submission.language.is_some() {
        participant.language = submission.language;
    }

    Ok(SubmitOutcome {
        game_completed: complete_if_everyone_finished(game),
    })
}

/// Remove `user_id` from the lobby, handing the host flag over when needed.
///
/// The earliest remaining joiner inherits the host flag.
pub fn depart(game: &mut GameEntity, user_id: Uuid) -> Result<DepartOutcome, LobbyError> {
    let leaver = game
        .participants
        .shift_remove(&user_id)
        .ok_or(LobbyError::PlayerNotInGame)?;

    if game.participants.is_empty() {
        return Ok(DepartOutcome::LastPlayerLeft);
    }

    let mut new_host = None;
    if leaver.is_host || game.host().is_none() {
        if let Some((&successor, participant)) = game.participants.first_mut() {
            participant.is_host = true;
            new_host = Some(successor);
        }
    }

    Ok(DepartOutcome::Remaining {
        new_host,
        game_completed: complete_if_everyone_finished(game),
    })
}

fn complete_if_everyone_finished(game: &mut GameEntity) -> bool {
    let everyone_done = !game.participants.is_empty()
        && game
            .participants
            .values()
            .all(|participant| participant.is_completed);
    if !everyone_done {
        return false;
    }

    match next_status(game.status, LobbyEvent::AllCompleted) {
        Ok(status) => {
            game.status = status;
            true
        }
        Err(_) => false,
    }
}
