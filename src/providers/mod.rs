pub mod coingecko_provider;
pub mod exchangerate_provider;
pub mod util;

pub use coingecko_provider::CoinGeckoProvider;
pub use exchangerate_provider::ExchangeRateApiProvider;
