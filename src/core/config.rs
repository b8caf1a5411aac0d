use super::currency::{CurrencyCode, ProviderId};
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{debug, info};

pub const API_KEY_ENV: &str = "EXCHANGERATE_API_KEY";

fn default_timeout_secs() -> u64 {
    10
}

fn codes(list: &[&str]) -> Vec<CurrencyCode> {
    list.iter().filter_map(|c| c.parse().ok()).collect()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FiatProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub currencies: Vec<CurrencyCode>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl FiatProviderConfig {
    /// Key from the config file, falling back to the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl Default for FiatProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://v6.exchangerate-api.com/v6".to_string(),
            api_key: None,
            currencies: codes(&["USD", "EUR", "GBP", "RUB"]),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CryptoProviderConfig {
    pub base_url: String,
    pub currencies: Vec<CurrencyCode>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CryptoProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            currencies: codes(&["BTC", "ETH", "SOL"]),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub fiat: FiatProviderConfig,
    #[serde(default)]
    pub crypto: CryptoProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between refresh cycles.
    pub interval_secs: u64,
    /// Extra attempts per provider and cycle after the first one fails.
    pub max_retries: usize,
    /// First backoff delay; doubles on every further attempt.
    pub backoff_ms: u64,
    /// Age after which cached rates are reported as stale.
    pub max_age_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30 * 60,
            max_retries: 3,
            backoff_ms: 500,
            max_age_secs: 300,
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    /// Loads the config from the default location, or the defaults when no
    /// config file has been created yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            info!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "ratekeeper", "ratekeeper")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "ratekeeper", "ratekeeper")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_ownership(ProviderId::FiatProvider, &self.providers.fiat.currencies)?;
        check_ownership(
            ProviderId::CryptoProvider,
            &self.providers.crypto.currencies,
        )?;
        if self.scheduler.interval_secs == 0 {
            bail!("scheduler.interval_secs must be greater than zero");
        }
        if self.providers.fiat.timeout_secs == 0 || self.providers.crypto.timeout_secs == 0 {
            bail!("Provider timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn fiat_currencies(&self) -> BTreeSet<CurrencyCode> {
        self.providers.fiat.currencies.iter().copied().collect()
    }

    pub fn crypto_currencies(&self) -> BTreeSet<CurrencyCode> {
        self.providers.crypto.currencies.iter().copied().collect()
    }
}

fn check_ownership(provider: ProviderId, currencies: &[CurrencyCode]) -> Result<()> {
    if let Some(code) = currencies.iter().find(|c| c.provider() != provider) {
        bail!("{} is served by {}, not {}", code, code.provider(), provider);
    }
    Ok(())
}
