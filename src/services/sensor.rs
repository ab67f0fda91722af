//! Sensor view: the display contract a home-automation consumer reads.
//!
//! State is the next slot label, or a fixed fallback when nothing is free.
//! Everything else is exposed as named attributes.

use serde::Serialize;
use utoipa::ToSchema;

use crate::config::SensorConfig;
use crate::services::coordinator::RefreshCoordinator;
use crate::services::slots::AvailabilitySummary;

/// State text when no free slot exists (or no summary yet).
pub const NO_FREE_SLOTS: &str = "Keine freien Slots";

pub const SENSOR_ICON: &str = "mdi:racquetball";

const FACILITY_PAGE_BASE: &str = "https://www.eversports.de/s";

/// Named attributes next to the state.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SensorAttributes {
    /// ISO 8601 with the facility's UTC offset
    pub next_slot_datetime: Option<String>,
    pub next_slot_court_id: Option<String>,
    pub total_slots: Option<usize>,
    pub available_slots_count: Option<usize>,
    /// Today's free start times ("HH:MM")
    pub available_slots_list: Vec<String>,
    pub last_update: Option<String>,
    pub api_url: Option<String>,
    pub facility_id: String,
    pub sport: String,
    pub monitored_courts: String,
}

/// Device the sensor belongs to: one per facility.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DeviceInfo {
    pub identifier: String,
    pub name: String,
    pub manufacturer: String,
    pub configuration_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SensorView {
    pub unique_id: String,
    pub name: String,
    pub icon: String,
    /// Next slot label, or "Keine freien Slots"
    pub state: String,
    /// False until the first success and while the latest refresh is failing
    pub available: bool,
    pub attribution: Option<String>,
    pub last_error: Option<String>,
    pub attributes: SensorAttributes,
    pub device: DeviceInfo,
}

impl SensorView {
    /// Read the coordinator's current state into a view.
    pub async fn read(coordinator: &RefreshCoordinator) -> Self {
        let state = coordinator.state().await;
        Self::from_parts(
            coordinator.config(),
            state.last_good_summary.as_ref(),
            state.last_error,
        )
    }

    pub fn from_parts(
        config: &SensorConfig,
        summary: Option<&AvailabilitySummary>,
        last_error: Option<String>,
    ) -> Self {
        let state = summary
            .and_then(|s| s.next_slot_display.clone())
            .unwrap_or_else(|| NO_FREE_SLOTS.to_string());

        let attribution = summary.map(|s| {
            format!(
                "Last update: {} from {}",
                s.computed_at.format("%Y-%m-%d %H:%M:%S"),
                s.source_url
            )
        });

        let attributes = SensorAttributes {
            next_slot_datetime: summary
                .and_then(|s| s.next_slot_timestamp)
                .map(|ts| ts.to_rfc3339()),
            next_slot_court_id: summary.and_then(|s| s.next_slot_court.clone()),
            total_slots: summary.map(|s| s.total_slot_count),
            available_slots_count: summary.map(|s| s.available_future_count),
            available_slots_list: summary
                .map(|s| s.todays_available_times.clone())
                .unwrap_or_default(),
            last_update: summary.map(|s| s.computed_at.to_rfc3339()),
            api_url: summary.map(|s| s.source_url.clone()),
            facility_id: config.facility_id.clone(),
            sport: config.sport.clone(),
            monitored_courts: config.court_ids.clone(),
        };

        Self {
            unique_id: config.unique_id(),
            name: format!("{} Next Available", config.title()),
            icon: SENSOR_ICON.to_string(),
            state,
            available: summary.is_some() && last_error.is_none(),
            attribution,
            last_error,
            attributes,
            device: DeviceInfo {
                identifier: config.facility_id.clone(),
                name: format!("Eversports Facility {}", config.facility_id),
                manufacturer: "Eversports".to_string(),
                configuration_url: format!("{}/{}", FACILITY_PAGE_BASE, config.facility_id),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::availability::{compute_availability, FACILITY_TZ};
    use chrono::TimeZone;
    use serde_json::json;

    fn config() -> SensorConfig {
        SensorConfig {
            facility_id: "76443".to_string(),
            sport: "squash".to_string(),
            court_ids: "12,13".to_string(),
        }
    }

    fn summary(slots: &[serde_json::Value]) -> AvailabilitySummary {
        let now = FACILITY_TZ.with_ymd_and_hms(2024, 6, 10, 10, 0, 0).unwrap();
        compute_availability(slots, &now, "https://example.test/slot")
    }

    #[test]
    fn test_state_and_attributes_from_summary() {
        let s = summary(&[
            json!({ "date": "2024-06-10", "start": "1630", "present": false, "court": 12 }),
            json!({ "date": "2024-06-10", "start": "1800", "present": true, "court": 13 }),
        ]);
        let view = SensorView::from_parts(&config(), Some(&s), None);

        assert_eq!(view.state, "16:30");
        assert!(view.available);
        assert_eq!(view.name, "Eversports Squash Next Available");
        assert_eq!(
            view.attributes.next_slot_datetime.as_deref(),
            Some("2024-06-10T16:30:00+02:00")
        );
        assert_eq!(view.attributes.next_slot_court_id.as_deref(), Some("12"));
        assert_eq!(view.attributes.total_slots, Some(2));
        assert_eq!(view.attributes.available_slots_count, Some(1));
        assert_eq!(view.attributes.available_slots_list, vec!["16:30"]);
        assert_eq!(view.attributes.monitored_courts, "12,13");
        assert_eq!(
            view.attribution.as_deref(),
            Some("Last update: 2024-06-10 10:00:00 from https://example.test/slot")
        );
        assert_eq!(view.device.configuration_url, "https://www.eversports.de/s/76443");
    }

    #[test]
    fn test_fallback_state_when_nothing_free() {
        let s = summary(&[]);
        let view = SensorView::from_parts(&config(), Some(&s), None);
        assert_eq!(view.state, NO_FREE_SLOTS);
        assert_eq!(view.attributes.total_slots, Some(0));
        assert!(view.attributes.available_slots_list.is_empty());
    }

    #[test]
    fn test_stale_summary_with_error_is_unavailable() {
        let s = summary(&[
            json!({ "date": "2024-06-11", "start": "0900", "present": false, "court": 12 }),
        ]);
        let view = SensorView::from_parts(
            &config(),
            Some(&s),
            Some("Error communicating with API: timeout".to_string()),
        );
        assert_eq!(view.state, "Morgen, 09:00");
        assert!(!view.available);
        assert!(view.last_error.is_some());
    }

    #[test]
    fn test_no_summary_echoes_config_only() {
        let view = SensorView::from_parts(&config(), None, None);
        assert_eq!(view.state, NO_FREE_SLOTS);
        assert!(!view.available);
        assert_eq!(view.attribution, None);
        assert_eq!(view.attributes.total_slots, None);
        assert_eq!(view.attributes.facility_id, "76443");
        assert_eq!(view.attributes.sport, "squash");
    }
}
