use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{dto::ws::HandshakeParams, services::realtime_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/ws",
    tag = "realtime",
    params(HandshakeParams),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a lobby WebSocket session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Query(params): Query<HandshakeParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| realtime_service::handle_socket(state, socket, params))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}
