//! Rate types shared by providers, the cache and the repository

use super::currency::{CurrencyCode, ProviderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A rate exactly as a provider reported it, tagged with the provider's
/// quoting direction. `None` means the provider omitted the value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawRate {
    /// Base-currency price of one unit of the currency (crypto quotes).
    BasePerUnit(Option<f64>),
    /// Units of the currency bought by one unit of base currency (fiat quotes).
    UnitsPerBase(Option<f64>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub currency: CurrencyCode,
    /// Base-currency value of one unit of `currency`. Always positive and finite.
    pub rate_to_base: f64,
    pub observed_at: DateTime<Utc>,
    pub source: ProviderId,
}

/// Immutable set of rates captured at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    captured_at: DateTime<Utc>,
    rates: BTreeMap<CurrencyCode, RateEntry>,
}

impl RateSnapshot {
    pub fn new(captured_at: DateTime<Utc>, rates: BTreeMap<CurrencyCode, RateEntry>) -> Self {
        Self { captured_at, rates }
    }

    /// Placeholder held by a cache that has never received a snapshot. It is
    /// older than any real snapshot, so the first swap always wins.
    pub fn empty() -> Self {
        Self {
            captured_at: DateTime::<Utc>::MIN_UTC,
            rates: BTreeMap::new(),
        }
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn rates(&self) -> &BTreeMap<CurrencyCode, RateEntry> {
        &self.rates
    }

    pub fn get(&self, currency: &CurrencyCode) -> Option<&RateEntry> {
        self.rates.get(currency)
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Age of the snapshot at `now`.
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.captured_at)
    }

    /// True iff `now - captured_at > max_age`.
    pub fn is_stale_at(&self, max_age: std::time::Duration, now: DateTime<Utc>) -> bool {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        self.age_at(now) > max_age
    }

    /// Units of `to` equal to one unit of `from`, derived through the base
    /// currency. The base currency itself is always priced at 1.
    pub fn cross_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Option<f64> {
        let from_rate = self.base_value(from)?;
        let to_rate = self.base_value(to)?;
        Some(from_rate / to_rate)
    }

    fn base_value(&self, currency: &CurrencyCode) -> Option<f64> {
        if currency.is_base() {
            return Some(1.0);
        }
        self.rates.get(currency).map(|entry| entry.rate_to_base)
    }
}
