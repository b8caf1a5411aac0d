use super::currency::CurrencyCode;
use super::rate::{RateEntry, RateSnapshot};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheState {
    current: Arc<RateSnapshot>,
    last_known_good: Option<Arc<RateSnapshot>>,
}

/// In-memory holder of the current rate snapshot.
///
/// Reads never wait on I/O: they clone an `Arc` to the current snapshot.
/// Snapshots are replaced whole by [`RateCache::swap`], which refuses any
/// snapshot not strictly newer than the one it holds.
#[derive(Clone)]
pub struct RateCache {
    inner: Arc<watch::Sender<CacheState>>,
}

impl RateCache {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(CacheState {
            current: Arc::new(RateSnapshot::empty()),
            last_known_good: None,
        });
        Self { inner: Arc::new(tx) }
    }

    pub fn read(&self, currency: &CurrencyCode) -> Option<RateEntry> {
        let value = self.inner.borrow().current.get(currency).cloned();
        if value.is_some() {
            debug!("Cache HIT for currency: {}", currency);
        } else {
            debug!("Cache MISS for currency: {}", currency);
        }
        value
    }

    pub fn read_all(&self) -> Arc<RateSnapshot> {
        Arc::clone(&self.inner.borrow().current)
    }

    /// The snapshot that was current before the last accepted swap.
    pub fn last_known_good(&self) -> Option<Arc<RateSnapshot>> {
        self.inner.borrow().last_known_good.clone()
    }

    /// Installs `snapshot` if it is strictly newer than the current one.
    /// Returns whether the swap happened.
    pub fn swap(&self, snapshot: RateSnapshot) -> bool {
        let snapshot = Arc::new(snapshot);
        let accepted = self.inner.send_if_modified(|state| {
            if snapshot.captured_at() <= state.current.captured_at() {
                return false;
            }
            let previous = std::mem::replace(&mut state.current, Arc::clone(&snapshot));
            if !previous.is_empty() {
                state.last_known_good = Some(previous);
            }
            true
        });

        if accepted {
            debug!(
                captured_at = %snapshot.captured_at(),
                rates = snapshot.len(),
                "Cache SWAP"
            );
        } else {
            debug!(
                captured_at = %snapshot.captured_at(),
                "Cache SWAP rejected, snapshot is not newer than current"
            );
        }
        accepted
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.is_stale_at(max_age, Utc::now())
    }

    /// True iff the current snapshot is older than `max_age` at `now`.
    pub fn is_stale_at(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.read_all().is_stale_at(max_age, now)
    }

    /// Receiver that is notified after every accepted swap.
    pub fn subscribe(&self) -> CacheSubscription {
        CacheSubscription {
            rx: self.inner.subscribe(),
        }
    }
}

impl Default for RateCache {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CacheSubscription {
    rx: watch::Receiver<CacheState>,
}

impl CacheSubscription {
    /// Waits for the next accepted swap and returns the new snapshot.
    /// Returns `None` once the cache has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<RateSnapshot>> {
        self.rx.changed().await.ok()?;
        Some(Arc::clone(&self.rx.borrow_and_update().current))
    }
}
