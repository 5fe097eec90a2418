//! Retry helper for static page requests.
//!
//! Transient failures (429, network errors, 5xx) are retried with exponential
//! backoff. Everything else, including block pages and 4xx responses, is
//! returned on the first failure so the caller can move on to the next page
//! or strategy.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Upper bound on a single backoff sleep regardless of configuration.
const MAX_BACKOFF_MS: u64 = 10_000;

/// Returns `true` if `err` is transient and worth another attempt.
///
/// Retriable:
/// - [`ScraperError::RateLimited`] (HTTP 429)
/// - [`ScraperError::Http`] (connection reset, request timeout, TLS hiccup)
/// - [`ScraperError::UnexpectedStatus`] with a 5xx status
///
/// A [`ScraperError::Blocked`] page is never retried: hammering a challenge
/// page only deepens the block.
fn is_retriable(err: &ScraperError) -> bool {
    matches!(
        err,
        ScraperError::RateLimited { .. } | ScraperError::Http(_)
    ) || err.is_server_error()
}

/// Executes `operation`, retrying transient errors up to `max_retries` extra times.
///
/// The wait before the n-th retry is `backoff_base_ms * 2^(n-1)`, capped at
/// ten seconds. With `max_retries = 1` the operation runs at most twice.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !is_retriable(&err) || attempt >= max_retries {
            return Err(err);
        }

        let delay_ms = backoff_base_ms
            .saturating_mul(1u64 << attempt.min(62))
            .min(MAX_BACKOFF_MS);
        tracing::warn!(
            attempt,
            max_retries,
            delay_ms,
            error = %err,
            "transient fetch error, retrying after backoff"
        );
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        attempt += 1;
    }
}
