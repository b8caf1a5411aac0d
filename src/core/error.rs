//! Error taxonomy for rate acquisition.
//!
//! Provider and validation errors stay inside a refresh cycle; they are
//! logged and never reach cache readers. [`CacheError`] is the only error a
//! caller of the rate subsystem has to handle.

use super::currency::{CurrencyCode, ProviderId};
use thiserror::Error;

/// Failure of a single provider call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The provider did not answer within the per-call timeout.
    #[error("Timeout: {provider}")]
    Timeout { provider: ProviderId },

    /// Connection failure or an unsuccessful HTTP status.
    #[error("Unreachable: {provider} - {reason}")]
    Unreachable { provider: ProviderId, reason: String },

    /// The body could not be decoded, or the provider reported an error in it.
    #[error("Malformed response: {provider} - {reason}")]
    MalformedResponse { provider: ProviderId, reason: String },

    /// HTTP 429 or a quota error from the provider.
    #[error("Rate limited: {provider}")]
    RateLimited { provider: ProviderId },

    /// A requested code is not served by this provider.
    #[error("Unsupported currency for {provider}: {currency}")]
    UnsupportedCurrency {
        provider: ProviderId,
        currency: CurrencyCode,
    },

    #[error("Misconfigured: {provider} - {reason}")]
    Misconfigured { provider: ProviderId, reason: String },
}

impl ProviderError {
    /// Whether another attempt in the same cycle may succeed.
    ///
    /// Transport level failures are transient; a bad body, a bad request or
    /// missing configuration will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout { .. }
                | ProviderError::Unreachable { .. }
                | ProviderError::RateLimited { .. }
        )
    }

    pub fn provider(&self) -> ProviderId {
        match self {
            ProviderError::Timeout { provider }
            | ProviderError::Unreachable { provider, .. }
            | ProviderError::MalformedResponse { provider, .. }
            | ProviderError::RateLimited { provider }
            | ProviderError::UnsupportedCurrency { provider, .. }
            | ProviderError::Misconfigured { provider, .. } => *provider,
        }
    }
}

/// A raw rate that was rejected during normalization.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Non-positive rate for {currency}: {value}")]
    NonPositiveRate { currency: CurrencyCode, value: f64 },

    #[error("Non-finite rate for {currency}")]
    NonFiniteRate { currency: CurrencyCode },

    #[error("Missing rate for {currency}")]
    MissingField { currency: CurrencyCode },

    #[error("{currency} is not served by {provider}")]
    NotOwned {
        currency: CurrencyCode,
        provider: ProviderId,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// Startup found neither fresh rates nor a durable snapshot.
    #[error("No exchange rates available: providers unreachable and no saved snapshot")]
    EmptyAtStartup,
}
