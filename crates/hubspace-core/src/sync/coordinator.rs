// ── Poll loop ──
//
// Idle -> Polling -> (Succeeded | Failed) -> Idle on a fixed interval.
// Each cycle refreshes the catalog under a timeout, re-runs discovery and
// diffs the selected devices against the previous successful cycle.
// Cycles never overlap: the next sleep starts after the previous cycle
// has finished or been abandoned.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::diff::{Baseline, PollReport, baseline_of, diff};
use super::events::{Availability, PollPhase, SyncEvent, SyncEventStream};
use crate::discovery::DiscoveryFilter;
use crate::error::CoreError;
use crate::store::DeviceCatalog;

const EVENT_CHANNEL_SIZE: usize = 256;

/// Shortest poll interval accepted.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Poll tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub interval: Duration,
    /// Upper bound on one catalog refresh.
    pub poll_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            poll_timeout: Duration::from_secs(10),
        }
    }
}

impl SyncConfig {
    /// Reject intervals under [`MIN_POLL_INTERVAL`] and a zero timeout.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.interval < MIN_POLL_INTERVAL {
            return Err(CoreError::Config {
                message: format!(
                    "poll interval {:?} is below the minimum of {:?}",
                    self.interval, MIN_POLL_INTERVAL
                ),
            });
        }
        if self.poll_timeout.is_zero() {
            return Err(CoreError::Config {
                message: "poll timeout must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// How one poll cycle ended, short of an authentication failure.
#[derive(Debug)]
pub enum PollOutcome {
    Updated(PollReport),
    /// The refresh failed or timed out; the previous snapshot is kept.
    Degraded(CoreError),
}

pub struct StateSyncCoordinator {
    catalog: Arc<DeviceCatalog>,
    filter: DiscoveryFilter,
    config: SyncConfig,
    baseline: Mutex<Baseline>,
    consecutive_failures: AtomicU32,
    event_tx: broadcast::Sender<Arc<SyncEvent>>,
    availability: watch::Sender<Availability>,
    phase: watch::Sender<PollPhase>,
}

impl StateSyncCoordinator {
    /// Build a coordinator. The current catalog snapshot becomes the
    /// baseline, so the first poll only reports what changed after it.
    pub fn new(
        catalog: Arc<DeviceCatalog>,
        filter: DiscoveryFilter,
        config: SyncConfig,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let snapshot = catalog.snapshot();
        let baseline = baseline_of(&filter.select(&snapshot));
        let initial = if snapshot.fetched_at().is_some() {
            Availability::Available
        } else {
            Availability::Unknown
        };

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (availability, _) = watch::channel(initial);
        let (phase, _) = watch::channel(PollPhase::Idle);

        Ok(Self {
            catalog,
            filter,
            config,
            baseline: Mutex::new(baseline),
            consecutive_failures: AtomicU32::new(0),
            event_tx,
            availability,
            phase,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<DeviceCatalog> {
        &self.catalog
    }

    pub fn filter(&self) -> &DiscoveryFilter {
        &self.filter
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SyncEvent>> {
        self.event_tx.subscribe()
    }

    pub fn events(&self) -> SyncEventStream {
        SyncEventStream::new(self.event_tx.subscribe())
    }

    pub fn availability(&self) -> watch::Receiver<Availability> {
        self.availability.subscribe()
    }

    pub fn phase(&self) -> watch::Receiver<PollPhase> {
        self.phase.subscribe()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Take the catalog's current snapshot as the baseline without
    /// emitting anything. Used after a load outside the poll loop.
    pub async fn prime(&self) {
        let selected = self.filter.select(&self.catalog.snapshot());
        *self.baseline.lock().await = baseline_of(&selected);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let _ = self.availability.send(Availability::Available);
        debug!(selected = selected.len(), "poll baseline primed");
    }

    // ── Cycle ────────────────────────────────────────────────────────

    /// Run one poll cycle.
    ///
    /// Fetch and timeout failures are absorbed: they degrade availability
    /// and come back as [`PollOutcome::Degraded`]. Only an authentication
    /// failure is returned as an error.
    pub async fn poll_once(&self) -> Result<PollOutcome, CoreError> {
        let _ = self.phase.send(PollPhase::Polling);
        let result = self.refresh_and_diff().await;

        let outcome = match result {
            Ok(report) => {
                let _ = self.phase.send(PollPhase::Succeeded);
                self.record_success();
                Ok(PollOutcome::Updated(report))
            }
            Err(err) if err.is_auth() => {
                let _ = self.phase.send(PollPhase::Failed);
                warn!(error = %err, "polling stopped: authentication failed");
                let _ = self.availability.send(Availability::Unauthorized);
                self.emit(SyncEvent::AuthenticationFailed {
                    message: err.to_string(),
                });
                Err(err)
            }
            Err(err) => {
                let _ = self.phase.send(PollPhase::Failed);
                self.record_failure(&err);
                Ok(PollOutcome::Degraded(err))
            }
        };

        let _ = self.phase.send(PollPhase::Idle);
        outcome
    }

    async fn refresh_and_diff(&self) -> Result<PollReport, CoreError> {
        let snapshot = tokio::time::timeout(self.config.poll_timeout, self.catalog.refresh())
            .await
            .map_err(|_| CoreError::Timeout {
                timeout_ms: u64::try_from(self.config.poll_timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        let selected = self.filter.select(&snapshot);
        let current = baseline_of(&selected);

        let mut baseline = self.baseline.lock().await;
        let report = diff(&baseline, &current);

        for device in selected.iter().filter(|d| report.changed.contains(&d.id)) {
            self.emit(SyncEvent::StateChanged {
                device_id: device.id.clone(),
                states: device.states.clone(),
            });
        }
        if !report.added.is_empty() || !report.removed.is_empty() {
            debug!(
                added = report.added.len(),
                removed = report.removed.len(),
                "device membership changed"
            );
            self.emit(SyncEvent::MembershipChanged {
                added: report.added.clone(),
                removed: report.removed.clone(),
            });
        }

        *baseline = current;
        debug!(
            selected = selected.len(),
            changed = report.changed.len(),
            "poll applied"
        );
        Ok(report)
    }

    fn record_success(&self) {
        let failures = self.consecutive_failures.swap(0, Ordering::Relaxed);
        if failures > 0 {
            info!(after_failures = failures, "polling recovered");
            self.emit(SyncEvent::Recovered);
        }
        let _ = self.availability.send(Availability::Available);
    }

    fn record_failure(&self, err: &CoreError) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures == 1 {
            warn!(error = %err, "poll failed, serving cached state");
        } else {
            debug!(error = %err, consecutive = failures, "poll failed again");
        }
        let _ = self.availability.send(Availability::Degraded {
            consecutive_failures: failures,
        });
        self.emit(SyncEvent::Degraded {
            reason: err.to_string(),
            consecutive_failures: failures,
        });
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(Arc::new(event));
    }

    // ── Loop ─────────────────────────────────────────────────────────

    /// Poll until cancelled or until credentials are rejected.
    ///
    /// Sleeps one interval before the first cycle; the catalog is expected
    /// to have been loaded already.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), CoreError> {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.config.interval) => {}
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = self.poll_once() => {
                    result?;
                }
            }
        }
        debug!("poll loop stopped");
        Ok(())
    }
}
