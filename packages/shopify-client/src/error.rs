//! Error types for the Shopify client.
//!
//! Every failure is mapped to a closed set of variants at the HTTP boundary so
//! callers can decide retry behavior without inspecting status codes.

use std::time::Duration;

use thiserror::Error;

/// Result type for Shopify client operations.
pub type Result<T> = std::result::Result<T, ShopifyError>;

/// Shopify client errors.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// Shopify throttled the request (HTTP 429).
    #[error("rate limited by Shopify")]
    RateLimited {
        /// Value of the `Retry-After` header, when present.
        retry_after: Option<Duration>,
    },

    /// Request rejected by Shopify (4xx other than 404 on single lookups and 429)
    #[error("client error {status}: {message}")]
    Client { status: u16, message: String },

    /// Shopify failed to serve the request (5xx)
    #[error("upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Transport failure (connection refused, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not have the expected shape
    #[error("parse error: {0}")]
    Parse(String),

    /// Client could not be constructed (bad shop domain, TLS backend failure)
    #[error("configuration error: {0}")]
    Config(String),
}

impl ShopifyError {
    /// HTTP status reported by Shopify, if the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ShopifyError::RateLimited { .. } => Some(429),
            ShopifyError::Client { status, .. } | ShopifyError::Upstream { status, .. } => {
                Some(*status)
            }
            ShopifyError::Http(e) => e.status().map(|s| s.as_u16()),
            ShopifyError::Parse(_) | ShopifyError::Config(_) => None,
        }
    }

    /// Stable machine-readable code for API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            ShopifyError::RateLimited { .. } => "SHOPIFY_RATE_LIMITED",
            ShopifyError::Client { .. } => "SHOPIFY_CLIENT_ERROR",
            ShopifyError::Upstream { .. } => "SHOPIFY_UPSTREAM_ERROR",
            ShopifyError::Http(_) => "SHOPIFY_HTTP_ERROR",
            ShopifyError::Parse(_) => "SHOPIFY_PARSE_ERROR",
            ShopifyError::Config(_) => "SHOPIFY_CONFIG_ERROR",
        }
    }
}
