use axum::{
    Extension, Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::game::{GameSnapshot, JoinGameQuery},
    error::{AppError, ErrorBody},
    services::{lobby_service, user_service},
    state::SharedState,
};

const USER_ID_HEADER: &str = "x-user-id";

/// Identity of the caller, resolved by [`require_user`].
#[derive(Debug, Clone, Copy)]
pub struct CallerId(pub Uuid);

/// Lobby endpoints acting on behalf of the caller identified by `X-User-Id`.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/game", post(join_or_create_game))
        .route("/game/current", get(current_game))
        .route("/game/{id}", get(get_game))
        .route_layer(middleware::from_fn_with_state(state, require_user))
}

/// Join the most recent pending lobby or create a new one.
#[utoipa::path(
    post,
    path = "/game",
    tag = "game",
    params(
        ("X-User-Id" = Uuid, Header, description = "Identifier of the calling user"),
        JoinGameQuery
    ),
    responses(
        (status = 201, description = "Lobby joined or created", body = GameSnapshot),
        (status = 401, description = "Missing or unknown caller", body = ErrorBody),
        (status = 404, description = "No challenge available", body = ErrorBody),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn join_or_create_game(
    State(state): State<SharedState>,
    Extension(CallerId(user_id)): Extension<CallerId>,
    Query(query): Query<JoinGameQuery>,
) -> Result<(StatusCode, Json<GameSnapshot>), AppError> {
    let snapshot = lobby_service::join_or_create_game(&state, user_id, query.difficulty).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Most recent game the caller participates in.
#[utoipa::path(
    get,
    path = "/game/current",
    tag = "game",
    params(("X-User-Id" = Uuid, Header, description = "Identifier of the calling user")),
    responses(
        (status = 200, description = "Caller's game", body = GameSnapshot),
        (status = 404, description = "Caller is in no game", body = ErrorBody)
    )
)]
pub async fn current_game(
    State(state): State<SharedState>,
    Extension(CallerId(user_id)): Extension<CallerId>,
) -> Result<Json<GameSnapshot>, AppError> {
    Ok(Json(
        lobby_service::find_game_by_user_id(&state, user_id).await?,
    ))
}

/// Retrieve a live game the caller participates in.
#[utoipa::path(
    get,
    path = "/game/{id}",
    tag = "game",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("X-User-Id" = Uuid, Header, description = "Identifier of the calling user")
    ),
    responses(
        (status = 200, description = "Game snapshot", body = GameSnapshot),
        (status = 403, description = "Caller is not a participant", body = ErrorBody),
        (status = 404, description = "Game not found or finished", body = ErrorBody)
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Extension(CallerId(user_id)): Extension<CallerId>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameSnapshot>, AppError> {
    Ok(Json(lobby_service::find_game(&state, id, user_id).await?))
}

/// Resolve `X-User-Id` into a [`CallerId`] extension, rejecting unknown callers.
pub(crate) async fn require_user(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing user header `X-User-Id`".into()))?
        .parse::<Uuid>()
        .map_err(|_| AppError::Unauthorized("malformed user id".into()))?;

    let user = user_service::require_user(&state, user_id)
        .await
        .map_err(|err| match err.lobby() {
            Some(_) => AppError::Unauthorized("unknown user".into()),
            None => err.into(),
        })?;

    req.extensions_mut().insert(CallerId(user.id));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::SystemTime};

    use axum::http::header::CONTENT_TYPE;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::{
        config::AppConfig,
        dao::{
            game_store::{GameStore, memory::MemoryGameStore},
            models::UserEntity,
        },
        services::challenge_service::seed_catalog,
        state::AppState,
    };

    use super::*;

    async fn app() -> (Router, MemoryGameStore) {
        let config = AppConfig::default();
        let store = MemoryGameStore::new();
        seed_catalog(&store, config.challenges()).await.unwrap();
        let state = AppState::new(config);
        state.install_game_store(Arc::new(store.clone())).await;
        (router(state.clone()).with_state(state), store)
    }

    async fn registered(store: &MemoryGameStore) -> Uuid {
        let user = UserEntity {
            id: Uuid::new_v4(),
            username: "ada".into(),
            created_at: SystemTime::now(),
        };
        store.save_user(user.clone()).await.unwrap();
        user.id
    }

    async fn json_body(res: Response) -> serde_json::Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn request(method: &str, uri: &str, user: Option<Uuid>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json");
        if let Some(user) = user {
            builder = builder.header("X-User-Id", user.to_string());
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn join_returns_created() {
        let (app, store) = app().await;
        let user = registered(&store).await;

        let response = app
            .oneshot(request("POST", "/game?difficulty=EASY", Some(user)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["status"], "PENDING");
        assert_eq!(body["challenge"]["difficulty"], "EASY");
        assert_eq!(body["participants"][0]["isHost"], true);
    }

    #[tokio::test]
    async fn unknown_or_missing_caller_is_unauthorized() {
        let (app, _) = app().await;

        let response = app
            .clone()
            .oneshot(request("POST", "/game", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(request("POST", "/game", Some(Uuid::new_v4())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_game_is_not_found() {
        let (app, store) = app().await;
        let user = registered(&store).await;

        let response = app
            .clone()
            .oneshot(request("GET", &format!("/game/{}", Uuid::new_v4()), Some(user)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["code"], "GAME_NOT_FOUND");

        let response = app
            .oneshot(request("GET", "/game/current", Some(user)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
