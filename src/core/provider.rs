//! Rate provider abstraction

use super::currency::{CurrencyCode, ProviderId};
use super::error::ProviderError;
use super::rate::RawRate;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

pub type RawRates = HashMap<CurrencyCode, RawRate>;

#[async_trait]
pub trait RateProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Fetches raw rates for `codes` with a single outbound request.
    ///
    /// `codes` must be owned by this provider. An empty set succeeds with an
    /// empty map and performs no I/O. Retrying is the caller's business.
    async fn fetch(
        &self,
        codes: &BTreeSet<CurrencyCode>,
        timeout: Duration,
    ) -> Result<RawRates, ProviderError>;
}

/// Rejects codes the provider does not own before any request is made.
pub fn ensure_owned(
    provider: ProviderId,
    codes: &BTreeSet<CurrencyCode>,
) -> Result<(), ProviderError> {
    match codes.iter().find(|code| code.provider() != provider) {
        Some(currency) => Err(ProviderError::UnsupportedCurrency {
            provider,
            currency: *currency,
        }),
        None => Ok(()),
    }
}
