//! Rate-limited, retried remote calls.

use std::future::Future;
use std::sync::Arc;

use shopify_client::ShopifyError;

use super::rate_limiter::SlidingWindowLimiter;
use super::retry::BackoffRetrier;

/// Every remote call passes the shared limiter on each attempt and is
/// retried on throttling.
#[derive(Clone)]
pub struct ThrottledCaller {
    limiter: Arc<SlidingWindowLimiter>,
    retrier: BackoffRetrier,
}

impl ThrottledCaller {
    pub fn new(limiter: Arc<SlidingWindowLimiter>, retrier: BackoffRetrier) -> Self {
        Self { limiter, retrier }
    }

    pub async fn call<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T, ShopifyError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ShopifyError>>,
    {
        let limiter = self.limiter.as_ref();
        self.retrier
            .retry(operation_name, || {
                let attempt = operation();
                async move {
                    limiter.wait_if_needed().await;
                    attempt.await
                }
            })
            .await
    }
}
