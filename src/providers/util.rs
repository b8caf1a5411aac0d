use crate::core::{ProviderError, ProviderId};
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

pub const USER_AGENT: &str = "ratekeeper/0.1";

/// Retries a provider call with exponential backoff.
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `base_delay`: Delay before the first retry; doubled for every further retry
///
/// Errors that are not retryable are returned immediately.
pub async fn with_backoff<F, Fut, T>(
    mut operation: F,
    retries: usize,
    base_delay: Duration,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries || !err.is_retryable() {
                    return Err(err);
                }
                let delay = backoff_delay(base_delay, attempt - 1);
                debug!(
                    provider = %err.provider(),
                    "Attempt {}/{} failed: {}. Retrying in {:?}...",
                    attempt, retries, err, delay
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Delay before retry number `retry` (zero based).
pub fn backoff_delay(base_delay: Duration, retry: usize) -> Duration {
    base_delay.saturating_mul(1u32.checked_shl(retry as u32).unwrap_or(u32::MAX))
}

/// Worst-case time spent by [`with_backoff`] around calls bounded by `timeout`.
pub fn retry_budget(timeout: Duration, retries: usize, base_delay: Duration) -> Duration {
    let attempts = timeout.saturating_mul(retries as u32 + 1);
    (0..retries).fold(attempts, |total, retry| {
        total.saturating_add(backoff_delay(base_delay, retry))
    })
}

/// Issues one GET and returns the body of a successful response.
pub async fn get_text(
    provider: ProviderId,
    url: &str,
    timeout: Duration,
) -> Result<String, ProviderError> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ProviderError::Misconfigured {
            provider,
            reason: e.to_string(),
        })?;

    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| transport_error(provider, e))?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited { provider });
    }
    if !status.is_success() {
        return Err(ProviderError::Unreachable {
            provider,
            reason: format!("HTTP error: {status}"),
        });
    }

    response
        .text()
        .await
        .map_err(|e| transport_error(provider, e))
}

fn transport_error(provider: ProviderId, e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout { provider }
    } else {
        ProviderError::Unreachable {
            provider,
            reason: format!("Request error: {e}"),
        }
    }
}
