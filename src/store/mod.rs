pub mod disk;
pub mod memory;

use crate::core::RateRepository;
use crate::core::config::AppConfig;
use disk::FjallRepository;
use memory::MemoryRepository;
use std::sync::Arc;
use tracing::warn;

/// Opens the on-disk repository under the configured data directory, falling
/// back to an in-memory one when the directory cannot be used.
pub fn open_repository(config: &AppConfig) -> Arc<dyn RateRepository> {
    let opened = config
        .data_dir()
        .and_then(|path| FjallRepository::open(&path.join("cache")));

    match opened {
        Ok(repository) => Arc::new(repository),
        Err(e) => {
            warn!(error = %e, "Rate store unavailable, snapshots will not survive restarts");
            Arc::new(MemoryRepository::new())
        }
    }
}
