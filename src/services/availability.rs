//! Availability engine.
//!
//! Turns the raw `slots` array of one Eversports response plus "now" into an
//! `AvailabilitySummary`. Pure: no I/O, no clock reads. The caller threads
//! `now` in, which keeps the today/tomorrow labelling testable.
//!
//! All calendar decisions use the facility timezone (Europe/Berlin). Around
//! midnight UTC and Berlin disagree about the date, so `now` is always
//! localized before anything else happens.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;

use crate::services::slots::{format_clock, AvailabilitySummary, Slot};

/// Timezone the facility's calendar runs in.
pub const FACILITY_TZ: Tz = chrono_tz::Europe::Berlin;

/// Label prefix for a next slot dated the day after today.
const TOMORROW_LABEL: &str = "Morgen";

/// Compute the availability summary for one refresh cycle.
///
/// A slot counts as available when it is not occupied and its
/// `(date, start)` is not before `(today, current minute)`, so a slot that
/// starts in the current minute is still offered. Records without a readable
/// `date`/`start` are skipped and counted in `skipped_slot_count`; they do
/// not fail the cycle.
pub fn compute_availability<Z: TimeZone>(
    raw_slots: &[serde_json::Value],
    now: &DateTime<Z>,
    source_url: &str,
) -> AvailabilitySummary {
    let now = now.with_timezone(&FACILITY_TZ);
    let today = now.date_naive();
    let current_minute = NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or(now.time());

    let mut skipped_slot_count = 0;
    let mut available: Vec<Slot> = Vec::with_capacity(raw_slots.len());

    for (index, value) in raw_slots.iter().enumerate() {
        match Slot::from_json(value) {
            Ok(slot) => {
                if !slot.occupied && (slot.date, slot.start) >= (today, current_minute) {
                    available.push(slot);
                }
            }
            Err(e) => {
                skipped_slot_count += 1;
                tracing::warn!("Skipping slot record #{}: {}", index, e);
            }
        }
    }

    // Stable: equal (date, start) keep upstream order.
    available.sort_by_key(|s| (s.date, s.start));

    let mut todays_times: Vec<NaiveTime> = available
        .iter()
        .filter(|s| s.date == today)
        .map(|s| s.start)
        .collect();
    todays_times.sort();

    let (next_slot_display, next_slot_timestamp, next_slot_court) = match available.first() {
        Some(next) => (
            Some(display_label(next.date, next.start, today)),
            facility_instant(next.date, next.start),
            next.court.clone(),
        ),
        None => (None, None, None),
    };

    AvailabilitySummary {
        next_slot_display,
        next_slot_timestamp,
        next_slot_court,
        total_slot_count: raw_slots.len(),
        available_future_count: available.len(),
        todays_available_times: todays_times.into_iter().map(format_clock).collect(),
        skipped_slot_count,
        computed_at: now.fixed_offset(),
        source_url: source_url.to_string(),
    }
}

/// Calendar date of `now` in the facility timezone.
pub fn facility_today<Z: TimeZone>(now: &DateTime<Z>) -> NaiveDate {
    now.with_timezone(&FACILITY_TZ).date_naive()
}

/// User-facing shorthand: bare time today, "Morgen, HH:MM" tomorrow,
/// "DD.MM, HH:MM" otherwise.
fn display_label(date: NaiveDate, start: NaiveTime, today: NaiveDate) -> String {
    let clock = format_clock(start);
    if date == today {
        clock
    } else if today.succ_opt() == Some(date) {
        format!("{}, {}", TOMORROW_LABEL, clock)
    } else {
        format!("{}, {}", date.format("%d.%m"), clock)
    }
}

/// Facility-local instant for a slot. Ambiguous local times (autumn DST
/// switch) resolve to the earlier instant; times inside the spring gap are
/// moved one hour forward.
fn facility_instant(date: NaiveDate, start: NaiveTime) -> Option<DateTime<FixedOffset>> {
    let naive = date.and_time(start);
    FACILITY_TZ
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            FACILITY_TZ
                .from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()
        })
        .map(|dt| dt.fixed_offset())
}
