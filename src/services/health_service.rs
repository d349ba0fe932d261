use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the storage backend and report whether the service runs degraded.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_game_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
                return HealthResponse::from_degraded(true);
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    HealthResponse::from_degraded(state.is_degraded())
}
