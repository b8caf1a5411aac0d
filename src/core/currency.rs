//! Supported currencies and provider routing

use anyhow::{Result, anyhow};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrencyKind {
    Fiat,
    Crypto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum ProviderId {
    FiatProvider,
    CryptoProvider,
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ProviderId::FiatProvider => "FiatProvider",
                ProviderId::CryptoProvider => "CryptoProvider",
            }
        )
    }
}

/// Which provider serves each kind of currency.
const ROUTES: [(CurrencyKind, ProviderId); 2] = [
    (CurrencyKind::Fiat, ProviderId::FiatProvider),
    (CurrencyKind::Crypto, ProviderId::CryptoProvider),
];

#[derive(Debug)]
pub struct CurrencyInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub kind: CurrencyKind,
    /// Asset id used by the crypto provider's API.
    pub asset_id: Option<&'static str>,
}

static REGISTRY: [CurrencyInfo; 7] = [
    CurrencyInfo {
        code: "USD",
        name: "US Dollar",
        kind: CurrencyKind::Fiat,
        asset_id: None,
    },
    CurrencyInfo {
        code: "EUR",
        name: "Euro",
        kind: CurrencyKind::Fiat,
        asset_id: None,
    },
    CurrencyInfo {
        code: "GBP",
        name: "British Pound",
        kind: CurrencyKind::Fiat,
        asset_id: None,
    },
    CurrencyInfo {
        code: "RUB",
        name: "Russian Ruble",
        kind: CurrencyKind::Fiat,
        asset_id: None,
    },
    CurrencyInfo {
        code: "BTC",
        name: "Bitcoin",
        kind: CurrencyKind::Crypto,
        asset_id: Some("bitcoin"),
    },
    CurrencyInfo {
        code: "ETH",
        name: "Ethereum",
        kind: CurrencyKind::Crypto,
        asset_id: Some("ethereum"),
    },
    CurrencyInfo {
        code: "SOL",
        name: "Solana",
        kind: CurrencyKind::Crypto,
        asset_id: Some("solana"),
    },
];

/// A currency from the supported registry.
///
/// Codes are upper-cased and trimmed when parsed; anything outside the
/// registry fails to parse, so every `CurrencyCode` in the program is known.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize)]
#[serde(into = "String")]
pub struct CurrencyCode(&'static str);

/// All portfolio valuations and rates are expressed relative to this currency.
pub const BASE_CURRENCY: CurrencyCode = CurrencyCode("USD");

impl CurrencyCode {
    pub fn as_str(&self) -> &'static str {
        self.0
    }

    pub fn info(&self) -> &'static CurrencyInfo {
        REGISTRY
            .iter()
            .find(|info| info.code == self.0)
            .unwrap_or(&REGISTRY[0])
    }

    pub fn kind(&self) -> CurrencyKind {
        self.info().kind
    }

    pub fn provider(&self) -> ProviderId {
        provider_for(self.kind())
    }

    pub fn is_base(&self) -> bool {
        *self == BASE_CURRENCY
    }

    pub fn all() -> impl Iterator<Item = CurrencyCode> {
        REGISTRY.iter().map(|info| CurrencyCode(info.code))
    }

    /// Codes owned by the given provider.
    pub fn owned_by(provider: ProviderId) -> impl Iterator<Item = CurrencyCode> {
        Self::all().filter(move |code| code.provider() == provider)
    }
}

pub fn provider_for(kind: CurrencyKind) -> ProviderId {
    ROUTES
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, provider)| *provider)
        .unwrap_or(ProviderId::FiatProvider)
}

impl FromStr for CurrencyCode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        REGISTRY
            .iter()
            .find(|info| info.code == normalized)
            .map(|info| CurrencyCode(info.code))
            .ok_or_else(|| anyhow!("Unsupported currency: '{}'", s.trim()))
    }
}

impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0.to_string()
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl std::fmt::Debug for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let code: CurrencyCode = " btc ".parse().unwrap();
        assert_eq!(code.as_str(), "BTC");
        assert_eq!(code.kind(), CurrencyKind::Crypto);
        assert_eq!(code.info().asset_id, Some("bitcoin"));
    }

    #[test]
    fn test_parse_rejects_unknown_code() {
        let result = "DOGE".parse::<CurrencyCode>();
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "Unsupported currency: 'DOGE'"
        );
    }

    #[test]
    fn test_provider_routing_is_disjoint() {
        let fiat: Vec<_> = CurrencyCode::owned_by(ProviderId::FiatProvider).collect();
        let crypto: Vec<_> = CurrencyCode::owned_by(ProviderId::CryptoProvider).collect();

        assert!(fiat.contains(&BASE_CURRENCY));
        assert!(fiat.iter().all(|code| !crypto.contains(code)));
        assert_eq!(fiat.len() + crypto.len(), CurrencyCode::all().count());
    }

    #[test]
    fn test_serde_round_trips_through_string() {
        let code: CurrencyCode = serde_json::from_str("\"eth\"").unwrap();
        assert_eq!(code.as_str(), "ETH");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"ETH\"");
        assert!(serde_json::from_str::<CurrencyCode>("\"XYZ\"").is_err());
    }

    #[test]
    fn test_codes_decode_inside_owned_structs() {
        #[derive(serde::Deserialize)]
        struct Watchlist {
            currencies: Vec<CurrencyCode>,
        }

        let yaml = String::from("currencies: [usd, \" gbp \", SOL]");
        let watchlist: Watchlist = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            watchlist.currencies.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            vec!["USD", "GBP", "SOL"]
        );

        let err = serde_yaml::from_str::<Watchlist>("currencies: [DOGE]").err().unwrap();
        assert!(err.to_string().contains("Unsupported currency: 'DOGE'"));
    }
}
