use thiserror::Error;

use crate::dao::models::GameStatus;

/// Events that move a lobby through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyEvent {
    /// The host starts the match.
    Start,
    /// Every current participant has submitted.
    AllCompleted,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The status the lobby was in when the event was received.
    pub from: GameStatus,
    /// The event that cannot be applied from this status.
    pub event: LobbyEvent,
}

/// Compute the status reached by applying `event` to a lobby in `from`.
///
/// `PENDING --Start--> IN_PROGRESS --AllCompleted--> COMPLETED`. Terminal
/// statuses accept nothing; abandoned lobbies are deleted rather than moved
/// to `CANCELLED`.
pub fn next_status(from: GameStatus, event: LobbyEvent) -> Result<GameStatus, InvalidTransition> {
    match (from, event) {
        (GameStatus::Pending, LobbyEvent::Start) => Ok(GameStatus::InProgress),
        (GameStatus::InProgress, LobbyEvent::AllCompleted) => Ok(GameStatus::Completed),
        _ => Err(InvalidTransition { from, event }),
    }
}
