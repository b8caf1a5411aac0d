pub mod cli;
pub mod core;
pub mod providers;
pub mod scheduler;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::{CacheError, CurrencyCode, RateCache, RateProvider, RateRepository};
use crate::providers::{CoinGeckoProvider, ExchangeRateApiProvider};
use crate::scheduler::{CycleOutcome, ProviderSlot, RateUpdateScheduler, SchedulerSettings};
use anyhow::{Context, Result, bail};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub enum AppCommand {
    Rates,
    Update,
    Rate { from: String, to: String },
    Watch,
}

/// Wires both providers, the repository and a fresh cache into a scheduler.
pub fn build_scheduler(
    config: &AppConfig,
    repository: Arc<dyn RateRepository>,
) -> Arc<RateUpdateScheduler> {
    let fiat = &config.providers.fiat;
    let crypto = &config.providers.crypto;

    let slots = vec![
        ProviderSlot {
            provider: Arc::new(ExchangeRateApiProvider::new(
                &fiat.base_url,
                fiat.resolved_api_key(),
            )) as Arc<dyn RateProvider>,
            currencies: config.fiat_currencies(),
            timeout: Duration::from_secs(fiat.timeout_secs),
        },
        ProviderSlot {
            provider: Arc::new(CoinGeckoProvider::new(&crypto.base_url)),
            currencies: config.crypto_currencies(),
            timeout: Duration::from_secs(crypto.timeout_secs),
        },
    ];

    Arc::new(RateUpdateScheduler::new(
        RateCache::new(),
        repository,
        slots,
        SchedulerSettings::from(&config.scheduler),
    ))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Ratekeeper starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let repository = store::open_repository(&config);
    let scheduler = build_scheduler(&config, repository);
    let max_age = config.scheduler.max_age();

    match command {
        AppCommand::Rates => {
            load_rates(&scheduler, None).await?;
            cli::rates::print_snapshot(scheduler.cache(), max_age);
        }
        AppCommand::Update => {
            let outcome = refresh(&scheduler).await?;
            cli::rates::print_outcome(&outcome);
            cli::rates::print_snapshot(scheduler.cache(), max_age);
            if outcome == CycleOutcome::Failed {
                bail!("Rate update failed, showing previously stored rates");
            }
        }
        AppCommand::Rate { from, to } => {
            let from: CurrencyCode = from.parse()?;
            let to: CurrencyCode = to.parse()?;
            load_rates(&scheduler, Some(max_age)).await?;
            let snapshot = scheduler.cache().read_all();
            let rate = snapshot
                .cross_rate(&from, &to)
                .with_context(|| format!("No rate available for {from} -> {to}"))?;
            cli::rates::print_cross_rate(&from, &to, rate, scheduler.cache(), max_age);
        }
        AppCommand::Watch => {
            refresh(&scheduler).await?;
            cli::rates::watch(&scheduler, max_age).await?;
        }
    }
    Ok(())
}

/// Serves the stored snapshot, refreshing only when nothing is stored or it
/// is older than `refresh_after`. Returns the outcome of that refresh.
pub async fn load_rates(
    scheduler: &RateUpdateScheduler,
    refresh_after: Option<Duration>,
) -> Result<Option<CycleOutcome>> {
    let restored = scheduler.restore().await;
    let expired = refresh_after.is_some_and(|max_age| scheduler.cache().is_stale(max_age));
    if restored && !expired {
        return Ok(None);
    }

    let spinner = cli::ui::new_spinner("Fetching exchange rates...");
    let outcome = scheduler.refresh_now().await;
    spinner.finish_and_clear();

    if scheduler.cache().read_all().is_empty() {
        return Err(CacheError::EmptyAtStartup.into());
    }
    Ok(Some(outcome))
}

async fn refresh(scheduler: &RateUpdateScheduler) -> Result<CycleOutcome> {
    let spinner = cli::ui::new_spinner("Fetching exchange rates...");
    let outcome = scheduler.bootstrap().await;
    spinner.finish_and_clear();
    Ok(outcome?)
}
