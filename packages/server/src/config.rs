use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domains::contents::ReconcileConfig;
use crate::kernel::RetryConfig;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub shopify_api_version: String,
    pub rate_limit_max_requests: usize,
    pub rate_limit_window: Duration,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    pub article_fetch_chunk_size: usize,
    pub article_fetch_cooldown: Duration,
    pub verify_chunk_size: usize,
    pub reconcile_max_multiplier: u32,
    pub reconcile_max_duration: Duration,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
    /// Per-client inbound quota; unset disables it.
    pub inbound_rate_limit_per_second: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url: var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: parse_or(&var, "PORT", 8080)?,
            shopify_api_version: var("SHOPIFY_API_VERSION")
                .unwrap_or_else(|| shopify_client::DEFAULT_API_VERSION.to_string()),
            rate_limit_max_requests: parse_or(&var, "SHOPIFY_RATE_LIMIT_MAX_REQUESTS", 2)?,
            rate_limit_window: millis_or(&var, "SHOPIFY_RATE_LIMIT_WINDOW_MS", 1000)?,
            retry_max_attempts: parse_or(&var, "SHOPIFY_RETRY_MAX_ATTEMPTS", 5)?,
            retry_base_delay: millis_or(&var, "SHOPIFY_RETRY_BASE_DELAY_MS", 1000)?,
            article_fetch_chunk_size: parse_or(&var, "ARTICLE_FETCH_CHUNK_SIZE", 2)?,
            article_fetch_cooldown: millis_or(&var, "ARTICLE_FETCH_COOLDOWN_MS", 1000)?,
            verify_chunk_size: parse_or(&var, "VERIFY_CHUNK_SIZE", 5)?,
            reconcile_max_multiplier: parse_or(&var, "RECONCILE_MAX_MULTIPLIER", 4)?,
            reconcile_max_duration: millis_or(&var, "RECONCILE_MAX_DURATION_MS", 30_000)?,
            allowed_origins: var("ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            inbound_rate_limit_per_second: var("INBOUND_RATE_LIMIT_PER_SECOND")
                .map(|v| {
                    v.parse()
                        .context("INBOUND_RATE_LIMIT_PER_SECOND must be a valid number")
                })
                .transpose()?,
        })
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.retry_max_attempts, self.retry_base_delay)
    }

    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            max_multiplier: self.reconcile_max_multiplier,
            max_duration: self.reconcile_max_duration,
            verify_chunk_size: self.verify_chunk_size,
            article_chunk_size: self.article_fetch_chunk_size,
            article_cooldown: self.article_fetch_cooldown,
        }
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", name)),
        None => Ok(default),
    }
}

fn millis_or(var: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> Result<Duration> {
    parse_or(var, name, default).map(Duration::from_millis)
}
