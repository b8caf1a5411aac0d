use crate::core::currency::BASE_CURRENCY;
use crate::core::provider::ensure_owned;
use crate::core::{CurrencyCode, ProviderError, ProviderId, RateProvider, RawRate, RawRates};
use crate::providers::util::get_text;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Fiat rates from an ExchangeRate-API compatible endpoint. Quotes are units
/// of each currency per one unit of base currency.
pub struct ExchangeRateApiProvider {
    base_url: String,
    api_key: Option<String>,
}

impl ExchangeRateApiProvider {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        ExchangeRateApiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    result: String,
    #[serde(default, rename = "error-type")]
    error_type: Option<String>,
    #[serde(default)]
    conversion_rates: HashMap<String, Option<f64>>,
}

const PROVIDER: ProviderId = ProviderId::FiatProvider;

#[async_trait]
impl RateProvider for ExchangeRateApiProvider {
    fn id(&self) -> ProviderId {
        PROVIDER
    }

    #[instrument(name = "FiatRatesFetch", skip(self, codes), fields(count = codes.len()))]
    async fn fetch(
        &self,
        codes: &BTreeSet<CurrencyCode>,
        timeout: Duration,
    ) -> Result<RawRates, ProviderError> {
        ensure_owned(PROVIDER, codes)?;
        if codes.is_empty() {
            return Ok(RawRates::new());
        }

        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Misconfigured {
                provider: PROVIDER,
                reason: "ExchangeRate-API key not configured".to_string(),
            })?;

        let url = format!("{}/{}/latest/{}", self.base_url, api_key, BASE_CURRENCY);
        debug!("Requesting fiat rates from {}/***/latest/{}", self.base_url, BASE_CURRENCY);

        let text = get_text(PROVIDER, &url, timeout).await?;
        let data: LatestRatesResponse =
            serde_json::from_str(&text).map_err(|e| ProviderError::MalformedResponse {
                provider: PROVIDER,
                reason: format!("Failed to parse JSON response: {e}"),
            })?;

        if data.result != "success" {
            let error_type = data.error_type.unwrap_or_else(|| "unknown-error".to_string());
            return Err(match error_type.as_str() {
                "quota-reached" => ProviderError::RateLimited { provider: PROVIDER },
                "invalid-key" | "inactive-account" => ProviderError::Misconfigured {
                    provider: PROVIDER,
                    reason: error_type,
                },
                _ => ProviderError::MalformedResponse {
                    provider: PROVIDER,
                    reason: format!("Provider reported error: {error_type}"),
                },
            });
        }

        let rates = codes
            .iter()
            .map(|code| {
                let value = data.conversion_rates.get(code.as_str()).copied().flatten();
                if value.is_none() {
                    warn!("Currency {} not found in fiat provider response", code);
                }
                (*code, RawRate::UnitsPerBase(value))
            })
            .collect::<RawRates>();

        debug!("Fetched {} fiat rates", rates.len());
        Ok(rates)
    }
}
