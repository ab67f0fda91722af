//! Sensor HTTP endpoints.
//!
//! - GET  /api/v1/sensors
//! - GET  /api/v1/sensors/:id
//! - GET  /api/v1/sensors/:id/status
//! - GET  /api/v1/sensors/:id/summary
//! - POST /api/v1/sensors/:id/refresh
//! - DELETE /api/v1/sensors/:id

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::{AppError, ErrorResponse};
use crate::services::coordinator::{RefreshCoordinator, RefreshOutcome, RefreshState};
use crate::services::registry::CoordinatorRegistry;
use crate::services::sensor::SensorView;
use crate::services::slots::AvailabilitySummary;

/// Result of a manual refresh trigger.
#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    /// "updated", "skipped" (a refresh was already running) or "discarded"
    pub outcome: String,
    pub sensor: SensorView,
}

async fn lookup(registry: &CoordinatorRegistry, id: &str) -> Result<RefreshCoordinator, AppError> {
    registry
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Sensor '{}' not found", id)))
}

/// List all configured sensors.
#[utoipa::path(
    get,
    path = "/api/v1/sensors",
    tag = "Sensors",
    responses(
        (status = 200, description = "All sensors", body = Vec<SensorView>),
    )
)]
pub async fn list_sensors(State(registry): State<CoordinatorRegistry>) -> Json<Vec<SensorView>> {
    let mut views = Vec::new();
    for coordinator in registry.all().await {
        views.push(SensorView::read(&coordinator).await);
    }
    Json(views)
}

/// Get one sensor: state text, attributes and device info.
#[utoipa::path(
    get,
    path = "/api/v1/sensors/{id}",
    tag = "Sensors",
    params(("id" = String, Path, description = "Sensor id, `<facility_id>_<sport>`")),
    responses(
        (status = 200, description = "Sensor view", body = SensorView),
        (status = 404, description = "Unknown sensor", body = ErrorResponse),
    )
)]
pub async fn get_sensor(
    State(registry): State<CoordinatorRegistry>,
    Path(id): Path<String>,
) -> Result<Json<SensorView>, AppError> {
    let coordinator = lookup(&registry, &id).await?;
    Ok(Json(SensorView::read(&coordinator).await))
}

/// Get the refresh coordinator state of one sensor.
#[utoipa::path(
    get,
    path = "/api/v1/sensors/{id}/status",
    tag = "Sensors",
    params(("id" = String, Path, description = "Sensor id, `<facility_id>_<sport>`")),
    responses(
        (status = 200, description = "Coordinator state", body = RefreshState),
        (status = 404, description = "Unknown sensor", body = ErrorResponse),
    )
)]
pub async fn get_sensor_status(
    State(registry): State<CoordinatorRegistry>,
    Path(id): Path<String>,
) -> Result<Json<RefreshState>, AppError> {
    let coordinator = lookup(&registry, &id).await?;
    Ok(Json(coordinator.state().await))
}

/// Get the last good availability summary of one sensor.
#[utoipa::path(
    get,
    path = "/api/v1/sensors/{id}/summary",
    tag = "Sensors",
    params(("id" = String, Path, description = "Sensor id, `<facility_id>_<sport>`")),
    responses(
        (status = 200, description = "Last good summary", body = AvailabilitySummary),
        (status = 404, description = "Unknown sensor or no summary yet", body = ErrorResponse),
    )
)]
pub async fn get_sensor_summary(
    State(registry): State<CoordinatorRegistry>,
    Path(id): Path<String>,
) -> Result<Json<AvailabilitySummary>, AppError> {
    let coordinator = lookup(&registry, &id).await?;
    coordinator
        .current_summary()
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Sensor '{}' has no summary yet", id)))
}

/// Refresh a sensor now.
///
/// Dropped (outcome "skipped") when a refresh is already running. A failed
/// refresh answers 502; the sensor keeps its last good data.
#[utoipa::path(
    post,
    path = "/api/v1/sensors/{id}/refresh",
    tag = "Sensors",
    params(("id" = String, Path, description = "Sensor id, `<facility_id>_<sport>`")),
    responses(
        (status = 200, description = "Refresh outcome", body = RefreshResponse),
        (status = 404, description = "Unknown sensor", body = ErrorResponse),
        (status = 502, description = "Eversports could not be queried", body = ErrorResponse),
    )
)]
pub async fn refresh_sensor(
    State(registry): State<CoordinatorRegistry>,
    Path(id): Path<String>,
) -> Result<Json<RefreshResponse>, AppError> {
    let coordinator = lookup(&registry, &id).await?;
    let outcome = coordinator.refresh().await?;

    Ok(Json(RefreshResponse {
        outcome: match outcome {
            RefreshOutcome::Updated => "updated",
            RefreshOutcome::Skipped => "skipped",
            RefreshOutcome::Discarded => "discarded",
        }
        .to_string(),
        sensor: SensorView::read(&coordinator).await,
    }))
}

/// Tear a sensor down: stop its timer, cancel any in-flight fetch and drop it.
#[utoipa::path(
    delete,
    path = "/api/v1/sensors/{id}",
    tag = "Sensors",
    params(("id" = String, Path, description = "Sensor id, `<facility_id>_<sport>`")),
    responses(
        (status = 204, description = "Sensor removed"),
        (status = 404, description = "Unknown sensor", body = ErrorResponse),
    )
)]
pub async fn remove_sensor(
    State(registry): State<CoordinatorRegistry>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if registry.remove(&id).await {
        tracing::info!("Sensor '{}' removed", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Sensor '{}' not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorConfig;
    use crate::services::coordinator::{SystemClock, DEFAULT_UPDATE_INTERVAL};
    use crate::services::eversports::{EversportsClient, DEFAULT_USER_AGENT};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn registry_with_sensor(server: &MockServer) -> CoordinatorRegistry {
        let client =
            EversportsClient::new(&server.uri(), DEFAULT_USER_AGENT, Duration::from_secs(5))
                .unwrap();
        let config = SensorConfig {
            facility_id: "76443".to_string(),
            sport: "squash".to_string(),
            court_ids: "12".to_string(),
        };
        let coordinator =
            RefreshCoordinator::setup(config, client, Arc::new(SystemClock), DEFAULT_UPDATE_INTERVAL)
                .await
                .unwrap();
        let registry = CoordinatorRegistry::new();
        registry.insert(coordinator).await.unwrap();
        registry
    }

    #[tokio::test]
    async fn test_get_unknown_sensor_is_not_found() {
        let registry = CoordinatorRegistry::new();
        let result = get_sensor(State(registry), Path("nope".to_string())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_and_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "slots": [] })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let registry = registry_with_sensor(&server).await;

        let Json(views) = list_sensors(State(registry.clone())).await;
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].unique_id, "76443_squash");
        assert_eq!(views[0].state, "Keine freien Slots");

        let Json(resp) = refresh_sensor(State(registry.clone()), Path("76443_squash".to_string()))
            .await
            .unwrap();
        assert_eq!(resp.outcome, "updated");

        let failed =
            refresh_sensor(State(registry.clone()), Path("76443_squash".to_string())).await;
        assert!(matches!(failed, Err(AppError::UpdateFailed(_))));

        let Json(status) =
            get_sensor_status(State(registry.clone()), Path("76443_squash".to_string()))
                .await
                .unwrap();
        assert_eq!(status.failed_refreshes, 1);
        assert!(status.last_good_summary.is_some());

        let Json(summary) =
            get_sensor_summary(State(registry.clone()), Path("76443_squash".to_string()))
                .await
                .unwrap();
        assert_eq!(summary.total_slot_count, 0);
        assert_eq!(summary.next_slot_display, None);

        let removed = remove_sensor(State(registry.clone()), Path("76443_squash".to_string()))
            .await
            .unwrap();
        assert_eq!(removed, StatusCode::NO_CONTENT);
        let again = remove_sensor(State(registry.clone()), Path("76443_squash".to_string())).await;
        assert!(matches!(again, Err(AppError::NotFound(_))));
        assert!(registry.all().await.is_empty());
    }
}
