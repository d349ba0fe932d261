use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether a storage backend is currently installed and healthy.
    pub storage: bool,
}

impl HealthResponse {
    pub fn from_degraded(degraded: bool) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_string(),
            storage: !degraded,
        }
    }
}
