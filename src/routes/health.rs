use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::registry::CoordinatorRegistry;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status ("ok" when every sensor's last refresh succeeded, "degraded" otherwise)
    pub status: String,
    /// API version
    pub version: String,
    /// Number of configured sensors
    pub sensors: usize,
    /// Sensors whose latest refresh failed
    pub failing_sensors: Vec<String>,
}

/// Health check endpoint.
///
/// Returns status "degraded" (still 200) when any sensor is serving stale
/// data.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health_check(State(registry): State<CoordinatorRegistry>) -> Json<HealthResponse> {
    let coordinators = registry.all().await;
    let mut failing_sensors = Vec::new();
    for coordinator in &coordinators {
        if coordinator.last_error().await.is_some() {
            failing_sensors.push(coordinator.unique_id());
        }
    }

    Json(HealthResponse {
        status: if failing_sensors.is_empty() {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        sensors: coordinators.len(),
        failing_sensors,
    })
}
