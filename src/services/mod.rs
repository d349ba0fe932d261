/// Challenge catalog lookups and seeding.
pub mod challenge_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Lobby matchmaking and transactional game mutations.
pub mod lobby_service;
/// WebSocket lobby sessions and room broadcasts.
pub mod realtime_service;
/// Per-player game history aggregates.
pub mod statistic_service;
/// Storage connection supervisor with backoff and degraded mode.
pub mod storage_supervisor;
/// Player registration and lookup.
pub mod user_service;
