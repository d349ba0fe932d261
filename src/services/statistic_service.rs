//! Per-player history aggregated from the games they took part in.

use std::time::Duration;

use indexmap::IndexMap;
use tracing::debug;
use uuid::Uuid;

use crate::{
    dao::models::{Difficulty, GameEntity, GameStatus, ProgrammingLanguage},
    dto::statistic::{DifficultyCount, StatisticResponse, format_rate},
    error::ServiceError,
    services::user_service,
    state::SharedState,
};

const DIFFICULTIES: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

/// Statistics over every game `user_id` still participates in, failing with `USER_NOT_FOUND`.
pub async fn user_statistics(
    state: &SharedState,
    user_id: Uuid,
) -> Result<StatisticResponse, ServiceError> {
    let user = user_service::require_user(state, user_id).await?;
    let store = state.require_game_store().await?;
    let games = store.find_games_by_participant(user.id, None).await?;
    debug!(%user_id, games = games.len(), "computing player statistics");
    Ok(summarize(user.id, &games))
}

fn summarize(user_id: Uuid, games: &[GameEntity]) -> StatisticResponse {
    let completed_games = games
        .iter()
        .filter(|game| game.status == GameStatus::Completed)
        .count();

    let games_by_difficulty = DIFFICULTIES
        .iter()
        .map(|difficulty| DifficultyCount {
            difficulty: *difficulty,
            count: games
                .iter()
                .filter(|game| game.difficulty == *difficulty)
                .count(),
        })
        .collect();

    let mut languages: IndexMap<ProgrammingLanguage, usize> = IndexMap::new();
    let mut solve_times = Vec::new();
    for game in games {
        let Some(participant) = game.participants.get(&user_id) else {
            continue;
        };
        if let Some(language) = participant.language {
            *languages.entry(language).or_default() += 1;
        }
        if let Some(completed_at) = participant.completed_at {
            solve_times.push(
                completed_at
                    .duration_since(game.starts_at)
                    .unwrap_or_default(),
            );
        }
    }
    languages.sort_by(|_, left, _, right| right.cmp(left));

    StatisticResponse {
        total_games: games.len(),
        completed_games,
        completion_rate: format_rate(completed_games, games.len()),
        games_by_difficulty,
        language_usage: languages.into_keys().collect(),
        average_completion_time_ms: average_millis(&solve_times),
    }
}

fn average_millis(durations: &[Duration]) -> u64 {
    if durations.is_empty() {
        return 0;
    }
    let total: u128 = durations.iter().map(Duration::as_millis).sum();
    u64::try_from(total / durations.len() as u128).unwrap_or(u64::MAX)
}
