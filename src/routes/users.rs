use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::user::{RegisterUserRequest, UserSummary},
    error::{AppError, ErrorBody},
    services::user_service,
    state::SharedState,
};

/// Player registration and lookup.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/users", post(register_user))
        .route("/users/{id}", get(get_user))
}

/// Register a new player.
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "User registered", body = UserSummary),
        (status = 400, description = "Invalid username"),
        (status = 409, description = "Username already taken", body = ErrorBody),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<RegisterUserRequest>>,
) -> Result<(StatusCode, Json<UserSummary>), AppError> {
    let user = user_service::register_user(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Retrieve a player by identifier.
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User identifier")),
    responses(
        (status = 200, description = "User found", body = UserSummary),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
pub async fn get_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserSummary>, AppError> {
    Ok(Json(user_service::get_user(&state, id).await?))
}
