use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::models::{Difficulty, ProgrammingLanguage};

/// Aggregated history of a player across every game they took part in.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatisticResponse {
    pub total_games: usize,
    pub completed_games: usize,
    /// Share of completed games, formatted with one decimal, e.g. `"66.7%"`.
    pub completion_rate: String,
    /// Game counts for every difficulty tier, easiest first.
    pub games_by_difficulty: Vec<DifficultyCount>,
    /// Languages submitted with, most used first.
    pub language_usage: Vec<ProgrammingLanguage>,
    /// Mean time from game start to the player's submission.
    pub average_completion_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct DifficultyCount {
    pub difficulty: Difficulty,
    pub count: usize,
}

/// Render `part / whole` as a percentage with one decimal.
pub fn format_rate(part: usize, whole: usize) -> String {
    let rate = if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    };
    format!("{rate:.1}%")
}
