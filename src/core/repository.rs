//! Durable storage of the last known good snapshot

use super::rate::RateSnapshot;
use anyhow::Result;
use async_trait::async_trait;

/// Keeps the most recent snapshot across restarts. Used at startup and after
/// every accepted refresh; callers log failures instead of propagating them.
#[async_trait]
pub trait RateRepository: Send + Sync {
    async fn load_last_snapshot(&self) -> Result<Option<RateSnapshot>>;

    async fn save_snapshot(&self, snapshot: &RateSnapshot) -> Result<()>;
}
