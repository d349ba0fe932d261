//! Application-level configuration loading, including lobby tuning and the challenge catalog.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};
use tracing::{info, warn};

use crate::dao::models::{Difficulty, TestCaseEntity};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CODEDUEL_CONFIG_PATH";

/// Default number of players a lobby accepts.
pub const DEFAULT_MAX_LOBBY_SIZE: usize = 6;
const DEFAULT_START_GRACE: Duration = Duration::from_secs(30);
const DEFAULT_COMMIT_ATTEMPTS: u32 = 16;
const DEFAULT_MAX_CODE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    lobby: LobbySettings,
    challenges: Vec<ChallengeSeed>,
}

/// Tunables for lobby matchmaking and persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbySettings {
    /// Maximum number of participants per lobby (never below 2).
    pub max_lobby_size: usize,
    /// Delay between lobby creation and its scheduled start.
    pub start_grace: Duration,
    /// Compare-and-swap attempts before a write is reported as contended.
    pub commit_attempts: u32,
    /// Largest accepted code submission, in bytes.
    pub max_code_bytes: usize,
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            max_lobby_size: DEFAULT_MAX_LOBBY_SIZE,
            start_grace: DEFAULT_START_GRACE,
            commit_attempts: DEFAULT_COMMIT_ATTEMPTS,
            max_code_bytes: DEFAULT_MAX_CODE_BYTES,
        }
    }
}

/// Challenge inserted into an empty catalog on startup.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChallengeSeed {
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub starter_code: String,
    #[serde(default)]
    pub test_cases: Vec<SeedTestCase>,
}

/// JSON representation of a single test case inside a [`ChallengeSeed`].
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SeedTestCase {
    pub input: String,
    pub expected_output: String,
}

impl From<SeedTestCase> for TestCaseEntity {
    fn from(value: SeedTestCase) -> Self {
        Self {
            input: value.input,
            expected_output: value.expected_output,
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        max_lobby_size = app_config.lobby.max_lobby_size,
                        challenges = app_config.challenges.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON configuration document. Missing sections keep their defaults.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Build a configuration from explicit parts.
    pub fn new(mut lobby: LobbySettings, challenges: Vec<ChallengeSeed>) -> Self {
        lobby.max_lobby_size = lobby.max_lobby_size.max(2);
        lobby.commit_attempts = lobby.commit_attempts.max(1);
        Self { lobby, challenges }
    }

    pub fn lobby(&self) -> &LobbySettings {
        &self.lobby
    }

    /// Challenges seeded into an empty catalog.
    pub fn challenges(&self) -> &[ChallengeSeed] {
        &self.challenges
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            lobby: LobbySettings::default(),
            challenges: default_challenges(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    lobby: RawLobby,
    challenges: Option<Vec<ChallengeSeed>>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
struct RawLobby {
    max_lobby_size: Option<usize>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(rename = "start_grace_secs")]
    start_grace: Option<Duration>,
    commit_attempts: Option<u32>,
    max_code_bytes: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = LobbySettings::default();
        let raw = value.lobby;
        let lobby = LobbySettings {
            max_lobby_size: raw.max_lobby_size.unwrap_or(defaults.max_lobby_size).max(2),
            start_grace: raw.start_grace.unwrap_or(defaults.start_grace),
            commit_attempts: raw.commit_attempts.unwrap_or(defaults.commit_attempts).max(1),
            max_code_bytes: raw.max_code_bytes.unwrap_or(defaults.max_code_bytes),
        };
        Self {
            lobby,
            challenges: value.challenges.unwrap_or_else(default_challenges),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in catalog shipped with the binary.
fn default_challenges() -> Vec<ChallengeSeed> {
    let case = |input: &str, expected: &str| SeedTestCase {
        input: input.into(),
        expected_output: expected.into(),
    };
    vec![
        ChallengeSeed {
            title: "Reverse a String".into(),
            description: "Return the input string with its characters in reverse order.".into(),
            difficulty: Difficulty::Easy,
            starter_code: "function reverse(s) {\n  \n}\n".into(),
            test_cases: vec![case("\"hello\"", "\"olleh\""), case("\"\"", "\"\"")],
        },
        ChallengeSeed {
            title: "FizzBuzz".into(),
            description: "Print the numbers 1 to n, replacing multiples of 3 with Fizz, \
                          multiples of 5 with Buzz and multiples of both with FizzBuzz."
                .into(),
            difficulty: Difficulty::Easy,
            starter_code: "function fizzBuzz(n) {\n  \n}\n".into(),
            test_cases: vec![case("5", "1 2 Fizz 4 Buzz")],
        },
        ChallengeSeed {
            title: "Balanced Brackets".into(),
            description: "Decide whether every bracket in the input is closed in the right order."
                .into(),
            difficulty: Difficulty::Medium,
            starter_code: "function isBalanced(s) {\n  \n}\n".into(),
            test_cases: vec![case("\"([]{})\"", "true"), case("\"(]\"", "false")],
        },
        ChallengeSeed {
            title: "Longest Increasing Subsequence".into(),
            description: "Return the length of the longest strictly increasing subsequence."
                .into(),
            difficulty: Difficulty::Hard,
            starter_code: "function lis(nums) {\n  \n}\n".into(),
            test_cases: vec![case("[10,9,2,5,3,7,101,18]", "4")],
        },
    ]
}
