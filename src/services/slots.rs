//! Slot data shapes.
//!
//! - `RawSlot`: one record exactly as the Eversports widget API sends it
//! - `Slot`: the same record with typed date and start time
//! - `AvailabilitySummary`: the per-cycle snapshot derived from all slots
//!
//! Upstream sends `date` as `YYYY-MM-DD` and `start` as a 4-digit 24h clock
//! string (`"1630"`). Both are parsed into chrono types here and only turned
//! back into strings when building the summary.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;

/// Court identifier. Upstream sends it as either a number or a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourtId(pub String);

impl<'de> Deserialize<'de> for CourtId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(s) => CourtId(s),
            Repr::Number(n) => CourtId(n.to_string()),
        })
    }
}

/// One booking slot as reported by the source.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSlot {
    pub date: Option<String>,
    pub start: Option<String>,
    /// Upstream names the booked flag `present`. Missing or null means free.
    #[serde(rename = "present", default)]
    pub occupied: Option<bool>,
    #[serde(default)]
    pub court: Option<CourtId>,
}

/// A slot with typed date and start time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub occupied: bool,
    pub court: Option<String>,
}

impl TryFrom<RawSlot> for Slot {
    type Error = AppError;

    fn try_from(raw: RawSlot) -> Result<Self, Self::Error> {
        let date_str = raw
            .date
            .ok_or_else(|| AppError::MalformedSlot("missing 'date'".to_string()))?;
        let start_str = raw
            .start
            .ok_or_else(|| AppError::MalformedSlot("missing 'start'".to_string()))?;

        let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
            .map_err(|e| AppError::MalformedSlot(format!("bad date '{}': {}", date_str, e)))?;
        let start = parse_start(&start_str)?;

        Ok(Slot {
            date,
            start,
            occupied: raw.occupied.unwrap_or(false),
            court: raw.court.map(|c| c.0),
        })
    }
}

impl Slot {
    /// Interpret one JSON record from the `slots` array.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, AppError> {
        let raw = RawSlot::deserialize(value)
            .map_err(|e| AppError::MalformedSlot(format!("unreadable record: {}", e)))?;
        Slot::try_from(raw)
    }
}

/// Parse a 4-digit clock string (`"0930"`) into a time of day.
pub fn parse_start(start: &str) -> Result<NaiveTime, AppError> {
    let bad = || AppError::MalformedSlot(format!("bad start '{}'", start));

    if start.len() != 4 || !start.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let hour: u32 = start[..2].parse().map_err(|_| bad())?;
    let minute: u32 = start[2..].parse().map_err(|_| bad())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(bad)
}

/// Format a time of day as `HH:MM`.
pub fn format_clock(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Derived, immutable availability snapshot for one refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AvailabilitySummary {
    /// "16:30", "Morgen, 09:00" or "15.06, 18:00"; absent when nothing is free
    pub next_slot_display: Option<String>,
    /// Facility-local instant of the next free slot
    pub next_slot_timestamp: Option<DateTime<FixedOffset>>,
    pub next_slot_court: Option<String>,
    /// Number of records the source reported, free or not
    pub total_slot_count: usize,
    pub available_future_count: usize,
    /// Free start times on the reference day, ascending ("HH:MM")
    pub todays_available_times: Vec<String>,
    /// Records skipped because `date` or `start` was missing or unreadable
    pub skipped_slot_count: usize,
    pub computed_at: DateTime<FixedOffset>,
    pub source_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_start_valid() {
        assert_eq!(
            parse_start("1630").unwrap(),
            NaiveTime::from_hms_opt(16, 30, 0).unwrap()
        );
        assert_eq!(
            parse_start("0000").unwrap(),
            NaiveTime::from_hms_opt(0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_start_rejects_bad_widths_and_values() {
        assert!(parse_start("930").is_err());
        assert!(parse_start("16:30").is_err());
        assert!(parse_start("2460").is_err());
        assert!(parse_start("ab30").is_err());
    }

    #[test]
    fn test_format_clock() {
        let t = NaiveTime::from_hms_opt(9, 5, 0).unwrap();
        assert_eq!(format_clock(t), "09:05");
    }

    #[test]
    fn test_slot_from_json_full_record() {
        let slot = Slot::from_json(&json!({
            "date": "2024-06-10",
            "start": "1630",
            "present": true,
            "court": 12
        }))
        .unwrap();
        assert_eq!(slot.date, NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
        assert_eq!(slot.start, NaiveTime::from_hms_opt(16, 30, 0).unwrap());
        assert!(slot.occupied);
        assert_eq!(slot.court.as_deref(), Some("12"));
    }

    #[test]
    fn test_slot_from_json_string_court_and_missing_present() {
        let slot = Slot::from_json(&json!({
            "date": "2024-06-10",
            "start": "0800",
            "court": "A1"
        }))
        .unwrap();
        assert!(!slot.occupied, "Missing 'present' means the slot is free");
        assert_eq!(slot.court.as_deref(), Some("A1"));
    }

    #[test]
    fn test_slot_from_json_null_present_is_free() {
        let slot = Slot::from_json(&json!({
            "date": "2024-06-10",
            "start": "0800",
            "present": null
        }))
        .unwrap();
        assert!(!slot.occupied);
        assert_eq!(slot.court, None);
    }

    #[test]
    fn test_slot_from_json_missing_date() {
        let err = Slot::from_json(&json!({ "start": "0800" })).unwrap_err();
        assert!(matches!(err, AppError::MalformedSlot(_)));
    }

    #[test]
    fn test_slot_from_json_not_an_object() {
        let err = Slot::from_json(&json!("1630")).unwrap_err();
        assert!(matches!(err, AppError::MalformedSlot(_)));
    }
}
