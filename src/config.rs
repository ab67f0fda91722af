use std::time::Duration;

use crate::errors::AppError;
use crate::services::coordinator::DEFAULT_UPDATE_INTERVAL;
use crate::services::eversports::{DEFAULT_USER_AGENT, EVERSPORTS_API_URL};

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// One monitored facility/sport/court set, as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorConfig {
    pub facility_id: String,
    pub sport: String,
    /// Comma-separated court ids, kept verbatim for the `monitored_courts` echo.
    pub court_ids: String,
}

impl SensorConfig {
    /// Stable instance id; one sensor per facility and sport.
    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.facility_id, self.sport)
    }

    /// "Eversports Squash" for sport "squash".
    pub fn title(&self) -> String {
        format!("Eversports {}", capitalize(&self.sport))
    }
}

/// Uppercase the first letter and lowercase the rest.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub base_url: String,
    pub user_agent: String,
    pub update_interval: Duration,
    pub request_timeout: Duration,
    pub sensors: Vec<SensorConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse configuration from any key lookup.
    ///
    /// Sensors come from `EVERSPORTS_SENSORS` (`facility/sport/courts;...`)
    /// when set, otherwise from the single `EVERSPORTS_FACILITY_ID`,
    /// `EVERSPORTS_SPORT`, `EVERSPORTS_COURT_IDS` trio.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(v) => v.parse().map_err(|_| {
                AppError::InvalidConfiguration(format!("PORT must be a valid u16, got '{}'", v))
            })?,
            None => 8080,
        };

        let update_interval = match lookup("UPDATE_INTERVAL_SECS") {
            Some(v) => Duration::from_secs(parse_positive_secs("UPDATE_INTERVAL_SECS", &v)?),
            None => DEFAULT_UPDATE_INTERVAL,
        };

        let request_timeout = Duration::from_secs(match lookup("REQUEST_TIMEOUT_SECS") {
            Some(v) => parse_positive_secs("REQUEST_TIMEOUT_SECS", &v)?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        });

        let sensors = match lookup("EVERSPORTS_SENSORS") {
            Some(list) => parse_sensor_list(&list)?,
            None => {
                let required = |key: &str| {
                    lookup(key).ok_or_else(|| {
                        AppError::InvalidConfiguration(format!(
                            "{} must be set (or use EVERSPORTS_SENSORS)",
                            key
                        ))
                    })
                };
                vec![SensorConfig {
                    facility_id: required("EVERSPORTS_FACILITY_ID")?.trim().to_string(),
                    sport: required("EVERSPORTS_SPORT")?.trim().to_string(),
                    court_ids: required("EVERSPORTS_COURT_IDS")?,
                }]
            }
        };

        Ok(Self {
            port,
            base_url: lookup("EVERSPORTS_BASE_URL")
                .unwrap_or_else(|| EVERSPORTS_API_URL.to_string()),
            user_agent: lookup("EVERSPORTS_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            update_interval,
            request_timeout,
            sensors,
        })
    }
}

fn parse_positive_secs(key: &str, value: &str) -> Result<u64, AppError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(AppError::InvalidConfiguration(format!(
            "{} must be a positive number of seconds, got '{}'",
            key, value
        ))),
    }
}

/// Parse `76443/squash/12,13;1200/badminton/4`.
fn parse_sensor_list(list: &str) -> Result<Vec<SensorConfig>, AppError> {
    let sensors = list
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(3, '/');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(facility_id), Some(sport), Some(court_ids)) => Ok(SensorConfig {
                    facility_id: facility_id.trim().to_string(),
                    sport: sport.trim().to_string(),
                    court_ids: court_ids.trim().to_string(),
                }),
                _ => Err(AppError::InvalidConfiguration(format!(
                    "sensor entry '{}' must look like facility/sport/court,court",
                    entry
                ))),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    if sensors.is_empty() {
        return Err(AppError::InvalidConfiguration(
            "EVERSPORTS_SENSORS contains no sensors".to_string(),
        ));
    }
    Ok(sensors)
}
