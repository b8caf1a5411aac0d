//! Converts provider quotes into base-currency rates.
//!
//! Every [`RateEntry`] leaving this module states the base-currency value of
//! one unit of its currency, whatever direction the provider quoted in.

use super::currency::{CurrencyCode, ProviderId};
use super::error::ValidationError;
use super::provider::RawRates;
use super::rate::{RateEntry, RawRate};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::warn;

/// Outcome of normalizing one provider response. Rejected entries do not
/// stop the rest from being accepted.
#[derive(Debug, Default)]
pub struct Normalized {
    pub entries: BTreeMap<CurrencyCode, RateEntry>,
    pub rejected: Vec<ValidationError>,
}

pub fn normalize(provider: ProviderId, raw: RawRates, observed_at: DateTime<Utc>) -> Normalized {
    let mut normalized = Normalized::default();

    for (currency, raw_rate) in raw {
        match to_base_rate(provider, currency, raw_rate) {
            Ok(rate_to_base) => {
                normalized.entries.insert(
                    currency,
                    RateEntry {
                        currency,
                        rate_to_base,
                        observed_at,
                        source: provider,
                    },
                );
            }
            Err(e) => {
                warn!(provider = %provider, currency = %currency, error = %e, "Rejected rate");
                normalized.rejected.push(e);
            }
        }
    }

    normalized
}

fn to_base_rate(
    provider: ProviderId,
    currency: CurrencyCode,
    raw: RawRate,
) -> Result<f64, ValidationError> {
    if currency.provider() != provider {
        return Err(ValidationError::NotOwned { currency, provider });
    }

    let (value, inverted) = match raw {
        RawRate::BasePerUnit(value) => (value, false),
        RawRate::UnitsPerBase(value) => (value, true),
    };
    let value = value.ok_or(ValidationError::MissingField { currency })?;

    if !value.is_finite() {
        return Err(ValidationError::NonFiniteRate { currency });
    }
    if value <= 0.0 {
        return Err(ValidationError::NonPositiveRate { currency, value });
    }

    let rate = if inverted { 1.0 / value } else { value };
    if !rate.is_finite() {
        return Err(ValidationError::NonFiniteRate { currency });
    }
    Ok(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> CurrencyCode {
        s.parse().unwrap()
    }

    #[test]
    fn test_negative_rate_is_dropped_with_one_error() {
        let raw = RawRates::from([(code("BTC"), RawRate::BasePerUnit(Some(-5.0)))]);

        let result = normalize(ProviderId::CryptoProvider, raw, Utc::now());

        assert!(!result.entries.contains_key(&code("BTC")));
        assert_eq!(
            result.rejected,
            vec![ValidationError::NonPositiveRate {
                currency: code("BTC"),
                value: -5.0
            }]
        );
    }

    #[test]
    fn test_partial_success_keeps_valid_entries() {
        let now = Utc::now();
        let raw = RawRates::from([
            (code("BTC"), RawRate::BasePerUnit(Some(45000.0))),
            (code("ETH"), RawRate::BasePerUnit(Some(0.0))),
            (code("SOL"), RawRate::BasePerUnit(None)),
        ]);

        let result = normalize(ProviderId::CryptoProvider, raw, now);

        assert_eq!(result.entries.len(), 1);
        let btc = &result.entries[&code("BTC")];
        assert_eq!(btc.rate_to_base, 45000.0);
        assert_eq!(btc.observed_at, now);
        assert_eq!(btc.source, ProviderId::CryptoProvider);
        assert_eq!(result.rejected.len(), 2);
        assert!(
            result
                .rejected
                .contains(&ValidationError::MissingField { currency: code("SOL") })
        );
    }

    #[test]
    fn test_fiat_quotes_are_inverted_to_base_value() {
        let raw = RawRates::from([
            (code("USD"), RawRate::UnitsPerBase(Some(1.0))),
            (code("EUR"), RawRate::UnitsPerBase(Some(0.8))),
        ]);

        let result = normalize(ProviderId::FiatProvider, raw, Utc::now());

        assert_eq!(result.entries[&code("USD")].rate_to_base, 1.0);
        assert!((result.entries[&code("EUR")].rate_to_base - 1.25).abs() < 1e-12);
        assert!(result.rejected.is_empty());
    }

    #[test]
    fn test_non_finite_values_are_rejected() {
        let raw = RawRates::from([
            (code("EUR"), RawRate::UnitsPerBase(Some(f64::NAN))),
            // Inverting a subnormal overflows to infinity.
            (code("GBP"), RawRate::UnitsPerBase(Some(1e-310))),
        ]);

        let result = normalize(ProviderId::FiatProvider, raw, Utc::now());

        assert!(result.entries.is_empty());
        assert!(
            result
                .rejected
                .iter()
                .all(|e| matches!(e, ValidationError::NonFiniteRate { .. }))
        );
        assert_eq!(result.rejected.len(), 2);
    }

    #[test]
    fn test_code_from_other_provider_is_rejected() {
        let raw = RawRates::from([(code("BTC"), RawRate::UnitsPerBase(Some(0.00002)))]);

        let result = normalize(ProviderId::FiatProvider, raw, Utc::now());

        assert!(result.entries.is_empty());
        assert_eq!(
            result.rejected,
            vec![ValidationError::NotOwned {
                currency: code("BTC"),
                provider: ProviderId::FiatProvider
            }]
        );
    }
}
