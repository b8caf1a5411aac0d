use crate::core::{RateRepository, RateSnapshot};
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const PARTITION: &str = "rates";
const LATEST_KEY: &[u8] = b"latest";

/// Snapshot repository backed by a fjall keyspace. The snapshot is stored as
/// JSON under a single key and overwritten on every save.
pub struct FjallRepository {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl FjallRepository {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create data directory: {}", path.display()))?;

        let keyspace = fjall::Config::new(path.join("rates_db"))
            .open()
            .with_context(|| format!("Failed to open rate store at {}", path.display()))?;
        let partition = keyspace.open_partition(PARTITION, PartitionCreateOptions::default())?;
        Ok(Self {
            keyspace,
            partition,
        })
    }
}

#[async_trait]
impl RateRepository for FjallRepository {
    async fn load_last_snapshot(&self) -> Result<Option<RateSnapshot>> {
        match self.partition.get(LATEST_KEY)? {
            Some(value) => {
                let snapshot: RateSnapshot = serde_json::from_slice(&value)
                    .context("Failed to decode stored rate snapshot")?;
                debug!(
                    captured_at = %snapshot.captured_at(),
                    rates = snapshot.len(),
                    "Loaded stored snapshot"
                );
                Ok(Some(snapshot))
            }
            None => {
                debug!("No stored snapshot");
                Ok(None)
            }
        }
    }

    async fn save_snapshot(&self, snapshot: &RateSnapshot) -> Result<()> {
        let value = serde_json::to_vec(snapshot)?;
        self.partition.insert(LATEST_KEY, value)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!(captured_at = %snapshot.captured_at(), "Stored snapshot");
        Ok(())
    }
}
