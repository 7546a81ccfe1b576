//! Retry with exponential back-off and jitter for the Admin API client.
//!
//! Transient failures (network errors, 429, 5xx) are retried; everything
//! else is returned immediately. A 429 carrying `Retry-After` waits at least
//! that long before the next attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::SourceError;

const MAX_DELAY_MS: u64 = 60_000;

/// Returns `true` for errors worth retrying after a back-off delay.
///
/// **Retriable:** network timeouts/resets, HTTP 429, HTTP 5xx.
///
/// **Not retriable:** auth failures, 404, remaining 4xx, malformed
/// responses, normalization errors — retrying cannot fix any of these.
pub(crate) fn is_retriable(err: &SourceError) -> bool {
    match err {
        SourceError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        SourceError::RateLimited { .. } => true,
        SourceError::UnexpectedStatus { status, .. } => *status >= 500,
        SourceError::Unauthorized { .. }
        | SourceError::NotFound { .. }
        | SourceError::Deserialize { .. }
        | SourceError::Normalization { .. }
        | SourceError::InvalidShopDomain { .. } => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// transient errors.
///
/// The n-th retry waits `backoff_base_secs × 2^(n−1)` seconds ± 25% jitter,
/// capped at 60s; a rate-limit error waits at least its advertised
/// `Retry-After`.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_secs
                    .saturating_mul(1000)
                    .saturating_mul(1u64 << (attempt - 1).min(10));
                let mut capped = computed.min(MAX_DELAY_MS);
                if let SourceError::RateLimited {
                    retry_after_secs, ..
                } = &err
                {
                    capped = capped.max(retry_after_secs.saturating_mul(1000));
                }
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "Shopify transient error — retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
