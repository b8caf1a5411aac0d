//! Periodic refresh of the rate cache.
//!
//! A refresh cycle fetches every provider concurrently, normalizes what came
//! back, merges it over the current snapshot and swaps the result into the
//! [`RateCache`]. Only one cycle runs at a time. A cycle in which no provider
//! produced a usable rate leaves the cache untouched.

use crate::core::config::SchedulerConfig;
use crate::core::normalizer::{Normalized, normalize};
use crate::core::{
    CacheError, CurrencyCode, ProviderError, RateCache, RateProvider, RateRepository, RateSnapshot,
};
use crate::providers::util::{retry_budget, with_backoff};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// A provider together with the codes it is asked for and its call timeout.
pub struct ProviderSlot {
    pub provider: Arc<dyn RateProvider>,
    pub currencies: BTreeSet<CurrencyCode>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub interval: Duration,
    pub max_retries: usize,
    pub backoff: Duration,
}

impl From<&SchedulerConfig> for SchedulerSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            interval: config.interval(),
            max_retries: config.max_retries,
            backoff: config.backoff(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Succeeded,
    PartiallyFailed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every configured code received a fresh rate.
    Succeeded { rates: usize },
    /// A new snapshot was installed but `missing` codes kept older values
    /// (or have none yet).
    PartiallyFailed {
        rates: usize,
        missing: Vec<CurrencyCode>,
    },
    /// No provider produced a usable rate; the cache was left as it was.
    Failed,
    /// Another cycle was in flight, so this one never started.
    Skipped,
}

impl CycleOutcome {
    fn terminal_state(&self) -> CycleState {
        match self {
            CycleOutcome::Succeeded { .. } => CycleState::Succeeded,
            CycleOutcome::PartiallyFailed { .. } => CycleState::PartiallyFailed,
            CycleOutcome::Failed => CycleState::Failed,
            CycleOutcome::Skipped => CycleState::Idle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub state: CycleState,
    pub last_outcome: Option<CycleOutcome>,
    pub last_success: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Startup,
    Timer,
    Manual,
}

impl Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Trigger::Startup => "startup",
                Trigger::Timer => "timer",
                Trigger::Manual => "manual",
            }
        )
    }
}

pub struct RateUpdateScheduler {
    cache: RateCache,
    repository: Arc<dyn RateRepository>,
    slots: Vec<ProviderSlot>,
    settings: SchedulerSettings,
    cycle_lock: Mutex<()>,
    cycles: AtomicU64,
    status: watch::Sender<SchedulerStatus>,
}

impl RateUpdateScheduler {
    pub fn new(
        cache: RateCache,
        repository: Arc<dyn RateRepository>,
        slots: Vec<ProviderSlot>,
        settings: SchedulerSettings,
    ) -> Self {
        let (status, _) = watch::channel(SchedulerStatus {
            state: CycleState::Idle,
            last_outcome: None,
            last_success: None,
        });
        Self {
            cache,
            repository,
            slots,
            settings,
            cycle_lock: Mutex::new(()),
            cycles: AtomicU64::new(0),
            status,
        }
    }

    pub fn cache(&self) -> &RateCache {
        &self.cache
    }

    pub fn status(&self) -> SchedulerStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> CycleState {
        self.status.borrow().state
    }

    /// Fills the cache before any reads are served.
    ///
    /// The stored snapshot is installed first, so a partially failed refresh
    /// still has earlier values to fall back on. Fails only when neither the
    /// refresh nor the repository produced any rates.
    pub async fn bootstrap(&self) -> Result<CycleOutcome, CacheError> {
        self.restore().await;

        let outcome = {
            let _guard = self.cycle_lock.lock().await;
            self.run_cycle(Trigger::Startup).await
        };

        let snapshot = self.cache.read_all();
        if snapshot.is_empty() {
            error!("No exchange rates available at startup");
            return Err(CacheError::EmptyAtStartup);
        }
        if outcome == CycleOutcome::Failed {
            warn!(
                captured_at = %snapshot.captured_at(),
                "Serving stored rates, rates may be stale"
            );
        }
        Ok(outcome)
    }

    /// Installs the last persisted snapshot, if any, without touching the
    /// network. Returns whether the cache now holds rates.
    pub async fn restore(&self) -> bool {
        match self.repository.load_last_snapshot().await {
            Ok(Some(snapshot)) => {
                info!(
                    captured_at = %snapshot.captured_at(),
                    rates = snapshot.len(),
                    "Loaded stored rate snapshot"
                );
                self.cache.swap(snapshot);
            }
            Ok(None) => debug!("No stored rate snapshot"),
            Err(e) => warn!(error = %e, "Failed to load stored rate snapshot"),
        }
        !self.cache.read_all().is_empty()
    }

    /// Runs a cycle now, waiting for any cycle already in flight to finish.
    pub async fn refresh_now(&self) -> CycleOutcome {
        let _guard = self.cycle_lock.lock().await;
        self.run_cycle(Trigger::Manual).await
    }

    /// Runs a timer cycle unless one is already in flight.
    pub(crate) async fn refresh_scheduled(&self) -> CycleOutcome {
        match self.cycle_lock.try_lock() {
            Ok(_guard) => self.run_cycle(Trigger::Timer).await,
            Err(_) => {
                warn!("Previous refresh cycle still running, skipping tick");
                CycleOutcome::Skipped
            }
        }
    }

    /// Spawns the timer task. The first timed cycle runs one interval from
    /// now; call [`bootstrap`](Self::bootstrap) beforehand to fill the cache.
    pub fn start(self: &Arc<Self>) -> SchedulerHandle {
        let scheduler = Arc::clone(self);
        let interval = self.settings.interval;
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval = ?interval, "Rate scheduler started");

            loop {
                // Stop wins over a tick that came due during the last cycle.
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        scheduler.refresh_scheduled().await;
                    }
                }
            }
            info!("Rate scheduler stopped");
        });

        SchedulerHandle { stop_tx, task }
    }

    /// Upper bound on a cycle: the slowest provider's full retry budget.
    fn cycle_ceiling(&self) -> Duration {
        self.slots
            .iter()
            .map(|slot| retry_budget(slot.timeout, self.settings.max_retries, self.settings.backoff))
            .max()
            .unwrap_or_default()
    }

    async fn run_cycle(&self, trigger: Trigger) -> CycleOutcome {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_state(CycleState::Fetching);
        info!(cycle, trigger = %trigger, "Rate refresh cycle started");

        let started_at = Utc::now();
        let ceiling = self.cycle_ceiling();
        let results = join_all(
            self.slots
                .iter()
                .map(|slot| self.fetch_slot(slot, ceiling, started_at)),
        )
        .await;

        let mut fresh = BTreeMap::new();
        for (slot, result) in self.slots.iter().zip(results) {
            let provider = slot.provider.id();
            match result {
                Ok(normalized) => {
                    info!(
                        cycle,
                        provider = %provider,
                        accepted = normalized.entries.len(),
                        rejected = normalized.rejected.len(),
                        "Provider fetch completed"
                    );
                    fresh.extend(normalized.entries);
                }
                Err(e) => {
                    warn!(cycle, provider = %provider, error = %e, "Provider fetch failed");
                }
            }
        }

        let outcome = if fresh.is_empty() {
            error!(cycle, "Refresh cycle failed, keeping previous rates");
            CycleOutcome::Failed
        } else {
            let missing: Vec<CurrencyCode> = self
                .slots
                .iter()
                .flat_map(|slot| slot.currencies.iter().copied())
                .filter(|code| !fresh.contains_key(code))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            let previous = self.cache.read_all();
            let mut merged = previous.rates().clone();
            merged.extend(fresh);
            let snapshot = RateSnapshot::new(
                next_capture_time(started_at, previous.captured_at()),
                merged,
            );
            let rates = snapshot.len();

            if self.cache.swap(snapshot.clone()) {
                if let Err(e) = self.repository.save_snapshot(&snapshot).await {
                    warn!(cycle, error = %e, "Failed to persist rate snapshot");
                }
                if missing.is_empty() {
                    CycleOutcome::Succeeded { rates }
                } else {
                    warn!(cycle, missing = ?missing, "Some rates were not refreshed, rates may be stale");
                    CycleOutcome::PartiallyFailed { rates, missing }
                }
            } else {
                error!(cycle, "Cache refused refreshed snapshot");
                CycleOutcome::Failed
            }
        };

        info!(cycle, outcome = ?outcome, "Rate refresh cycle finished");
        self.finish(&outcome);
        outcome
    }

    async fn fetch_slot(
        &self,
        slot: &ProviderSlot,
        ceiling: Duration,
        observed_at: DateTime<Utc>,
    ) -> Result<Normalized, ProviderError> {
        let provider = slot.provider.id();
        let fetch = with_backoff(
            || slot.provider.fetch(&slot.currencies, slot.timeout),
            self.settings.max_retries,
            self.settings.backoff,
        );

        match tokio::time::timeout(ceiling, fetch).await {
            Ok(raw) => Ok(normalize(provider, raw?, observed_at)),
            Err(_) => {
                warn!(provider = %provider, "Provider exceeded cycle ceiling, result discarded");
                Err(ProviderError::Timeout { provider })
            }
        }
    }

    fn set_state(&self, state: CycleState) {
        self.status.send_modify(|status| status.state = state);
    }

    fn finish(&self, outcome: &CycleOutcome) {
        let snapshot_time = self.cache.read_all().captured_at();
        self.status.send_modify(|status| {
            if matches!(
                outcome,
                CycleOutcome::Succeeded { .. } | CycleOutcome::PartiallyFailed { .. }
            ) {
                status.last_success = Some(snapshot_time);
            }
            status.last_outcome = Some(outcome.clone());
            status.state = outcome.terminal_state();
        });
        debug!(state = ?self.state(), "Cycle reached terminal state");
        self.set_state(CycleState::Idle);
    }
}

/// Capture time for a new snapshot, strictly after the current one so swaps
/// always move forward even if the clock does not.
fn next_capture_time(now: DateTime<Utc>, current: DateTime<Utc>) -> DateTime<Utc> {
    if now > current {
        now
    } else {
        current + chrono::Duration::microseconds(1)
    }
}

/// Running timer task. Stopping waits for an in-flight cycle to finish;
/// dropping the handle stops the task the same way without waiting.
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Rate scheduler task ended abnormally");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
