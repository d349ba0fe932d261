use axum::{Extension, Json, Router, extract::State, middleware, routing::get};
use uuid::Uuid;

use crate::{
    dto::statistic::StatisticResponse,
    error::{AppError, ErrorBody},
    routes::game::{CallerId, require_user},
    services::statistic_service,
    state::SharedState,
};

/// Statistics endpoints for the caller identified by `X-User-Id`.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/statistic", get(user_statistics))
        .route_layer(middleware::from_fn_with_state(state, require_user))
}

/// Aggregated game history of the caller.
#[utoipa::path(
    get,
    path = "/statistic",
    tag = "statistic",
    params(("X-User-Id" = Uuid, Header, description = "Identifier of the calling user")),
    responses(
        (status = 200, description = "Caller statistics", body = StatisticResponse),
        (status = 401, description = "Missing or unknown caller", body = ErrorBody),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn user_statistics(
    State(state): State<SharedState>,
    Extension(CallerId(user_id)): Extension<CallerId>,
) -> Result<Json<StatisticResponse>, AppError> {
    Ok(Json(
        statistic_service::user_statistics(&state, user_id).await?,
    ))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::SystemTime};

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::{
        config::AppConfig,
        dao::{
            game_store::{GameStore, memory::MemoryGameStore},
            models::UserEntity,
        },
        services::lobby_service,
        state::AppState,
    };

    use super::*;

    #[tokio::test]
    async fn caller_statistics_count_their_lobby() {
        let store = MemoryGameStore::new();
        let config = AppConfig::default();
        crate::services::challenge_service::seed_catalog(&store, config.challenges())
            .await
            .unwrap();
        let state = AppState::new(config);
        state.install_game_store(Arc::new(store.clone())).await;
        let user = UserEntity {
            id: Uuid::new_v4(),
            username: "ada".into(),
            created_at: SystemTime::now(),
        };
        store.save_user(user.clone()).await.unwrap();
        lobby_service::join_or_create_game(&state, user.id, None)
            .await
            .unwrap();
        let app = router(state.clone()).with_state(state);

        let response = app
            .clone()
            .oneshot(
                Request::get("/statistic")
                    .header("X-User-Id", user.id.to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["totalGames"], 1);
        assert_eq!(body["completedGames"], 0);
        assert_eq!(body["completionRate"], "0.0%");

        let response = app
            .oneshot(Request::get("/statistic").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
