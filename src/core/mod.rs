//! Core rate types, validation and caching

pub mod cache;
pub mod config;
pub mod currency;
pub mod error;
pub mod log;
pub mod normalizer;
pub mod provider;
pub mod rate;
pub mod repository;

// Re-export main types for cleaner imports
pub use cache::RateCache;
pub use currency::{BASE_CURRENCY, CurrencyCode, CurrencyKind, ProviderId};
pub use error::{CacheError, ProviderError, ValidationError};
pub use provider::{RateProvider, RawRates};
pub use rate::{RateEntry, RateSnapshot, RawRate};
pub use repository::RateRepository;
