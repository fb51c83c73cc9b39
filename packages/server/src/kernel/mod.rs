//! Kernel module - server infrastructure and dependencies.

pub mod batch;
pub mod deps;
pub mod rate_limiter;
pub mod retry;
pub mod test_dependencies;
pub mod throttle;
pub mod traits;

pub use batch::BatchRunner;
pub use deps::{
    PostgresContentStore, PostgresShopResolver, ServerDeps, ShopifyAdapter, ShopifyApiFactory,
};
pub use rate_limiter::SlidingWindowLimiter;
pub use retry::{BackoffRetrier, Classify, ErrorClass, RetryConfig};
pub use throttle::ThrottledCaller;
pub use traits::*;
