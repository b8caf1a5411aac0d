use crate::core::currency::BASE_CURRENCY;
use crate::core::provider::ensure_owned;
use crate::core::{CurrencyCode, ProviderError, ProviderId, RateProvider, RawRate, RawRates};
use crate::providers::util::get_text;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Crypto prices from a CoinGecko compatible `simple/price` endpoint.
/// Quotes are the base-currency price of one coin.
pub struct CoinGeckoProvider {
    base_url: String,
}

impl CoinGeckoProvider {
    pub fn new(base_url: &str) -> Self {
        CoinGeckoProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// `{"bitcoin": {"usd": 45000.0}, ...}`
type SimplePriceResponse = HashMap<String, HashMap<String, Option<f64>>>;

const PROVIDER: ProviderId = ProviderId::CryptoProvider;

#[async_trait]
impl RateProvider for CoinGeckoProvider {
    fn id(&self) -> ProviderId {
        PROVIDER
    }

    #[instrument(name = "CryptoRatesFetch", skip(self, codes), fields(count = codes.len()))]
    async fn fetch(
        &self,
        codes: &BTreeSet<CurrencyCode>,
        timeout: Duration,
    ) -> Result<RawRates, ProviderError> {
        ensure_owned(PROVIDER, codes)?;
        if codes.is_empty() {
            return Ok(RawRates::new());
        }

        let mut asset_ids = Vec::with_capacity(codes.len());
        for code in codes {
            let asset_id = code
                .info()
                .asset_id
                .ok_or(ProviderError::UnsupportedCurrency {
                    provider: PROVIDER,
                    currency: *code,
                })?;
            asset_ids.push((*code, asset_id));
        }

        let vs_currency = BASE_CURRENCY.as_str().to_lowercase();
        let ids = asset_ids
            .iter()
            .map(|(_, id)| *id)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies={}",
            self.base_url, ids, vs_currency
        );
        debug!("Requesting crypto prices from {}", url);

        let text = get_text(PROVIDER, &url, timeout).await?;
        let data: SimplePriceResponse =
            serde_json::from_str(&text).map_err(|e| ProviderError::MalformedResponse {
                provider: PROVIDER,
                reason: format!("Failed to parse JSON response: {e}"),
            })?;

        let rates = asset_ids
            .into_iter()
            .map(|(code, asset_id)| {
                let price = data
                    .get(asset_id)
                    .and_then(|prices| prices.get(&vs_currency))
                    .copied()
                    .flatten();
                if price.is_none() {
                    warn!("Price for {} ({}) missing in crypto provider response", code, asset_id);
                }
                (code, RawRate::BasePerUnit(price))
            })
            .collect::<RawRates>();

        debug!("Fetched {} crypto prices", rates.len());
        Ok(rates)
    }
}
