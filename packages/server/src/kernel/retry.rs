//! Retry with exponential backoff and jitter for throttled remote calls.
//!
//! Only errors classified as [`ErrorClass::RateLimited`] are retried. Client
//! errors and anything unrecognized fail immediately.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use shopify_client::ShopifyError;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// How a failed call should be treated by [`BackoffRetrier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Remote throttling signal. Retried with backoff.
    RateLimited,
    /// Request is invalid and will fail again. Never retried.
    NonRetryable,
    /// Anything else. Surfaced immediately.
    Other,
}

/// Errors that can be sorted into an [`ErrorClass`].
pub trait Classify {
    fn classify(&self) -> ErrorClass;

    /// Minimum wait requested by the remote side, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Classify for ShopifyError {
    fn classify(&self) -> ErrorClass {
        match self {
            ShopifyError::RateLimited { .. } => ErrorClass::RateLimited,
            ShopifyError::Client { .. } | ShopifyError::Config(_) => ErrorClass::NonRetryable,
            ShopifyError::Upstream { .. } | ShopifyError::Http(_) | ShopifyError::Parse(_) => {
                ErrorClass::Other
            }
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ShopifyError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Upper bound on invocations of the operation, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Jitter is drawn uniformly from `[0, max_jitter)`.
    pub max_jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::shopify()
    }
}

impl RetryConfig {
    /// Shopify REST throttling recovers within a couple of seconds.
    pub fn shopify() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(1000),
        }
    }

    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::shopify()
        }
    }

    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }
}

#[derive(Debug, Clone)]
pub struct BackoffRetrier {
    config: RetryConfig,
}

impl BackoffRetrier {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Run `operation` until it succeeds, fails with a non-throttling error,
    /// or `max_attempts` invocations have been made.
    pub async fn retry<F, Fut, T, E>(&self, operation_name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(operation = operation_name, retries = attempt, "Succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    attempt += 1;

                    match err.classify() {
                        ErrorClass::NonRetryable => {
                            debug!(operation = operation_name, error = %err, "Non-retryable failure");
                            return Err(err);
                        }
                        ErrorClass::Other => return Err(err),
                        ErrorClass::RateLimited if attempt >= max_attempts => {
                            warn!(
                                operation = operation_name,
                                attempts = attempt,
                                error = %err,
                                "Still rate limited, giving up"
                            );
                            return Err(err);
                        }
                        ErrorClass::RateLimited => {
                            let delay = self.delay_for(attempt - 1, err.retry_after());
                            warn!(
                                operation = operation_name,
                                attempt,
                                max_attempts,
                                delay_ms = delay.as_millis() as u64,
                                "Rate limited, backing off"
                            );
                            sleep(delay).await;
                        }
                    }
                }
            }
        }
    }

    /// `base_delay * 2^attempt + jitter`, never shorter than the remote's hint.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exponential = self
            .config
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));

        let jitter_ms = self.config.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(fastrand::u64(0..jitter_ms))
        };

        exponential.saturating_add(jitter).max(retry_after.unwrap_or_default())
    }
}
