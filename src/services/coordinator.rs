//! Refresh coordinator: owns the polling lifecycle of one configured sensor.
//!
//! Lifecycle:
//! - `setup` validates the configuration and runs one refresh before
//!   returning; if that refresh fails there is no state to fall back to, so
//!   setup fails
//! - afterwards a timer task refreshes every `interval` (15 minutes by default)
//! - at most one fetch is in flight; a trigger arriving mid-fetch is dropped
//! - on failure the last good summary stays in place and `last_error` is set
//! - `shutdown` cancels the timer and any in-flight fetch, then drops all state
//!
//! Each cycle draws a sequence number. An outcome is applied only when its
//! number is newer than the newest applied one, so a slow completion from an
//! older cycle can never overwrite a newer result.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use crate::config::SensorConfig;
use crate::errors::AppError;
use crate::services::availability::{compute_availability, facility_today};
use crate::services::eversports::{EversportsClient, FacilityQuery};
use crate::services::slots::AvailabilitySummary;

/// Default refresh period.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Source of "now". Injected so tests can pin the calendar.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Coordinator state, exposed read-only through the sensor endpoints.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct RefreshState {
    pub last_good_summary: Option<AvailabilitySummary>,
    pub last_error: Option<String>,
    pub in_flight: bool,
    /// Sequence number of the newest cycle whose outcome was applied
    pub last_completed_cycle: u64,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub total_refreshes: u64,
    pub failed_refreshes: u64,
}

/// What a refresh trigger did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new summary was stored.
    Updated,
    /// Another fetch was already in flight; this trigger was dropped.
    Skipped,
    /// The cycle finished after a newer one and its result was thrown away.
    Discarded,
}

/// Marks a fetch as in flight; released on drop.
struct InFlightGuard {
    in_flight: Arc<AtomicBool>,
}

impl InFlightGuard {
    fn try_acquire(in_flight: &Arc<AtomicBool>) -> Option<Self> {
        in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlightGuard {
                in_flight: in_flight.clone(),
            })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

struct Inner {
    config: SensorConfig,
    client: EversportsClient,
    clock: Arc<dyn Clock>,
    interval: Duration,
    state: RwLock<RefreshState>,
    in_flight: Arc<AtomicBool>,
    next_cycle: AtomicU64,
    cancel: CancellationToken,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to one sensor's coordinator. Cheap to clone.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    /// Validate the configuration, perform the first refresh and start the timer.
    pub async fn setup(
        config: SensorConfig,
        client: EversportsClient,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Result<Self, AppError> {
        let query = FacilityQuery::new(
            &config.facility_id,
            &config.sport,
            &config.court_ids,
            facility_today(&clock.now()),
        )?;
        client.build_request(&query)?;

        let coordinator = Self {
            inner: Arc::new(Inner {
                config,
                client,
                clock,
                interval,
                state: RwLock::new(RefreshState::default()),
                in_flight: Arc::new(AtomicBool::new(false)),
                next_cycle: AtomicU64::new(0),
                cancel: CancellationToken::new(),
                timer: Mutex::new(None),
            }),
        };

        if let Err(e) = coordinator.refresh().await {
            coordinator.shutdown().await;
            return Err(match e {
                AppError::UpdateFailed(msg) => AppError::SetupFailed(msg),
                other => other,
            });
        }

        coordinator.start_timer();

        tracing::info!(
            "Coordinator '{}' ready, refreshing every {}s",
            coordinator.unique_id(),
            interval.as_secs()
        );

        Ok(coordinator)
    }

    pub fn config(&self) -> &SensorConfig {
        &self.inner.config
    }

    pub fn unique_id(&self) -> String {
        self.inner.config.unique_id()
    }

    /// Last successfully computed summary, if any.
    pub async fn current_summary(&self) -> Option<AvailabilitySummary> {
        self.inner.state.read().await.last_good_summary.clone()
    }

    /// Description of the most recent failure, cleared by the next success.
    pub async fn last_error(&self) -> Option<String> {
        self.inner.state.read().await.last_error.clone()
    }

    /// Snapshot of the full coordinator state.
    pub async fn state(&self) -> RefreshState {
        let mut snapshot = self.inner.state.read().await.clone();
        snapshot.in_flight = self.inner.in_flight.load(Ordering::SeqCst);
        snapshot
    }

    /// Run one refresh cycle now.
    ///
    /// Returns `Skipped` when a fetch is already in flight, `UpdateFailed`
    /// when the cycle failed (the previous summary is kept), and `Cancelled`
    /// once shutdown has begun.
    pub async fn refresh(&self) -> Result<RefreshOutcome, AppError> {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let Some(_guard) = InFlightGuard::try_acquire(&inner.in_flight) else {
            tracing::debug!(
                "Coordinator '{}': refresh already in flight, dropping trigger",
                self.unique_id()
            );
            return Ok(RefreshOutcome::Skipped);
        };

        let cycle = self.begin_cycle();
        let started_at = inner.clock.now();

        let result = tokio::select! {
            _ = inner.cancel.cancelled() => return Err(AppError::Cancelled),
            r = self.fetch_summary() => r,
        };

        self.apply(cycle, started_at, result).await
    }

    /// Cancel the timer and any in-flight fetch, then release all state.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let handle = match self.inner.timer.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("Coordinator '{}': timer task ended abnormally: {}", self.unique_id(), e);
            }
        }

        *self.inner.state.write().await = RefreshState::default();
        tracing::info!("Coordinator '{}' shut down", self.unique_id());
    }

    fn begin_cycle(&self) -> u64 {
        self.inner.next_cycle.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn fetch_summary(&self) -> Result<AvailabilitySummary, AppError> {
        let inner = &self.inner;
        let query = FacilityQuery::new(
            &inner.config.facility_id,
            &inner.config.sport,
            &inner.config.court_ids,
            facility_today(&inner.clock.now()),
        )?;
        let request = inner.client.build_request(&query)?;
        let raw_slots = inner.client.fetch_slots(&request).await?;

        let now = inner.clock.now();
        Ok(compute_availability(&raw_slots, &now, &request.url))
    }

    /// Store the outcome of `cycle` unless a newer cycle already completed.
    async fn apply(
        &self,
        cycle: u64,
        started_at: DateTime<Utc>,
        result: Result<AvailabilitySummary, AppError>,
    ) -> Result<RefreshOutcome, AppError> {
        let mut state = self.inner.state.write().await;

        if self.inner.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        if cycle <= state.last_completed_cycle {
            tracing::warn!(
                "Coordinator '{}': discarding cycle {} (cycle {} already applied)",
                self.unique_id(),
                cycle,
                state.last_completed_cycle
            );
            return Ok(RefreshOutcome::Discarded);
        }

        state.last_completed_cycle = cycle;
        state.last_attempt_at = Some(started_at);
        state.total_refreshes += 1;

        match result {
            Ok(summary) => {
                tracing::info!(
                    "Coordinator '{}': cycle {} ok, next slot {:?}, {} of {} slots free",
                    self.unique_id(),
                    cycle,
                    summary.next_slot_display,
                    summary.available_future_count,
                    summary.total_slot_count
                );
                state.last_good_summary = Some(summary);
                state.last_error = None;
                state.last_success_at = Some(started_at);
                Ok(RefreshOutcome::Updated)
            }
            Err(e) => {
                let message = format!("Error communicating with API: {}", e);
                tracing::warn!(
                    "Coordinator '{}': cycle {} failed: {}",
                    self.unique_id(),
                    cycle,
                    message
                );
                state.failed_refreshes += 1;
                state.last_error = Some(message.clone());
                Err(AppError::UpdateFailed(message))
            }
        }
    }

    fn start_timer(&self) {
        let coordinator = self.clone();
        let handle = tokio::spawn(async move { coordinator.run_schedule().await });
        match self.inner.timer.lock() {
            Ok(mut slot) => *slot = Some(handle),
            Err(poisoned) => *poisoned.into_inner() = Some(handle),
        }
    }

    async fn run_schedule(self) {
        let period = self.inner.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.inner.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.refresh().await {
                        Ok(RefreshOutcome::Updated) => {}
                        Ok(outcome) => tracing::debug!(
                            "Coordinator '{}': scheduled refresh {:?}",
                            self.unique_id(),
                            outcome
                        ),
                        Err(AppError::Cancelled) => break,
                        // Already recorded in state; the next tick retries.
                        Err(_) => {}
                    }
                }
            }
        }

        tracing::debug!("Coordinator '{}': timer stopped", self.unique_id());
    }
}
