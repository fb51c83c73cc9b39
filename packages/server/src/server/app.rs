//! Application setup and server configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::get,
    Router,
};
use sqlx::PgPool;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::kernel::{ServerDeps, SlidingWindowLimiter};
use crate::server::routes::{contents_handler, health_handler};

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub deps: Arc<ServerDeps>,
}

/// Router options that do not belong to the dependency graph.
#[derive(Debug, Clone, Default)]
pub struct RouterOptions {
    /// Empty allows any origin.
    pub allowed_origins: Vec<String>,
    /// Per-client inbound quota on `/contents`; `None` disables it.
    pub inbound_rate_limit_per_second: Option<u64>,
}

impl From<&Config> for RouterOptions {
    fn from(config: &Config) -> Self {
        Self {
            allowed_origins: config.allowed_origins.clone(),
            inbound_rate_limit_per_second: config.inbound_rate_limit_per_second,
        }
    }
}

/// Build the Axum application from a pool and configuration.
///
/// Returns the router and the shared dependencies.
pub fn build_app(pool: PgPool, config: &Config) -> Result<(Router, Arc<ServerDeps>)> {
    let limiter = Arc::new(SlidingWindowLimiter::new(
        config.rate_limit_max_requests,
        config.rate_limit_window,
    ));

    let deps = Arc::new(ServerDeps::postgres(
        pool,
        config.shopify_api_version.clone(),
        limiter,
        config.retry_config(),
        config.reconcile_config(),
    ));

    let router = build_router(deps.clone(), &RouterOptions::from(config))?;
    Ok((router, deps))
}

/// Build the router around already-constructed dependencies.
pub fn build_router(deps: Arc<ServerDeps>, options: &RouterOptions) -> Result<Router> {
    let app_state = AxumAppState { deps };

    let allow_origin = if options.allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins = options
            .allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .with_context(|| format!("invalid allowed origin: {}", origin))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET])
        .allow_headers([CONTENT_TYPE]);

    let mut contents = Router::new().route("/contents", get(contents_handler));

    if let Some(per_second) = options.inbound_rate_limit_per_second.filter(|n| *n > 0) {
        let config = GovernorConfigBuilder::default()
            .per_millisecond((1000 / per_second).max(1))
            .burst_size(u32::try_from(per_second).unwrap_or(u32::MAX))
            .use_headers() // Extract IP from X-Forwarded-For header
            .finish()
            .context("invalid inbound rate limit configuration")?;

        tracing::info!(per_second, "Inbound rate limit enabled on /contents");
        contents = contents.layer(GovernorLayer {
            config: Arc::new(config),
        });
    }

    let app = Router::new()
        .merge(contents)
        // Health check (no rate limit)
        .route("/health", get(health_handler))
        .layer(Extension(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(app)
}
