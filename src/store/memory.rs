use crate::core::{RateRepository, RateSnapshot};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Repository that keeps the snapshot in memory only. Used when no data
/// directory is available and in tests.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    inner: Arc<Mutex<Option<RateSnapshot>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository that already holds `snapshot`.
    pub fn with_snapshot(snapshot: RateSnapshot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(snapshot))),
        }
    }
}

#[async_trait]
impl RateRepository for MemoryRepository {
    async fn load_last_snapshot(&self) -> Result<Option<RateSnapshot>> {
        let stored = self.inner.lock().await;
        debug!("Snapshot LOAD, present: {}", stored.is_some());
        Ok(stored.clone())
    }

    async fn save_snapshot(&self, snapshot: &RateSnapshot) -> Result<()> {
        let mut stored = self.inner.lock().await;
        debug!("Snapshot SAVE");
        *stored = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_save_then_load() {
        let repository = MemoryRepository::new();
        assert!(repository.load_last_snapshot().await.unwrap().is_none());

        let snapshot = RateSnapshot::new(Utc::now(), BTreeMap::new());
        repository.save_snapshot(&snapshot).await.unwrap();

        // Clones share the same storage.
        let other = repository.clone();
        assert_eq!(other.load_last_snapshot().await.unwrap(), Some(snapshot));
    }
}
