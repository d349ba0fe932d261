use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod game;
pub mod health;
pub mod statistic;
pub mod users;
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(users::router())
        .merge(websocket::router())
        .merge(game::router(state.clone()))
        .merge(statistic::router(state.clone()));

    api_router.merge(docs::router()).with_state(state)
}
