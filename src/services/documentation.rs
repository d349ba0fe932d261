use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for the CodeDuel lobby backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::users::register_user,
        crate::routes::users::get_user,
        crate::routes::game::join_or_create_game,
        crate::routes::game::current_game,
        crate::routes::game::get_game,
        crate::routes::statistic::user_statistics,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::user::RegisterUserRequest,
            crate::dto::user::UserSummary,
            crate::dto::game::GameSnapshot,
            crate::dto::game::ParticipantSnapshot,
            crate::dto::game::ChallengeSnapshot,
            crate::dto::game::TestCaseSnapshot,
            crate::dto::statistic::StatisticResponse,
            crate::dto::statistic::DifficultyCount,
            crate::dto::ws::ClientIntent,
            crate::dto::ws::ServerMessage,
            crate::dto::ws::ErrorPayload,
            crate::dao::models::GameStatus,
            crate::dao::models::Difficulty,
            crate::dao::models::ProgrammingLanguage,
            crate::error::ErrorBody,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "Player registration"),
        (name = "game", description = "Lobby matchmaking and lookup"),
        (name = "statistic", description = "Per-player game history"),
        (name = "realtime", description = "WebSocket lobby sessions"),
    )
)]
pub struct ApiDoc;
