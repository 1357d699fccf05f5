//! Retry with exponential backoff and jitter for provider calls
//!
//! Provider clients call external services at most once unless configured
//! with `max_retries > 0`.

use crate::errors::{AppError, Result};
use std::future::Future;
use std::time::Duration;

/// Base delay before the first retry
const RETRY_BASE_DELAY_MS: u64 = 200;

/// Run `operation` up to `max_retries + 1` times.
///
/// Client errors (validation, unsupported input) are returned immediately.
pub async fn with_retry<T, F, Fut>(service: &str, max_retries: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = max_retries.saturating_add(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_client_error() => return Err(e),
            Err(e) => {
                attempt += 1;
                if attempt >= attempts {
                    return Err(e);
                }

                let delay = backoff_delay(attempt);
                tracing::warn!(
                    service,
                    attempt,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let delay = RETRY_BASE_DELAY_MS * 2u64.pow(attempt.min(6) - 1);
    let jitter = rand::random::<u64>() % (delay / 2).max(1);
    Duration::from_millis(delay + jitter)
}

/// Read a failed response body for error messages
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    format!("{}: {}", status, body)
}

/// Classify a transport error for a given service
pub(crate) fn transport_error(
    make: fn(String) -> AppError,
    err: reqwest::Error,
) -> AppError {
    if err.is_timeout() {
        make(format!("request timed out: {}", err))
    } else if err.is_connect() {
        make(format!("connection failed: {}", err))
    } else {
        make(format!("request failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry("test", 0, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Embedding { message: "down".into() })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry("test", 2, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(AppError::Generation { message: "flaky".into() })
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry("test", 3, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::validation("bad input"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_grows() {
        assert!(backoff_delay(1) >= Duration::from_millis(200));
        assert!(backoff_delay(3) >= Duration::from_millis(800));
    }
}
