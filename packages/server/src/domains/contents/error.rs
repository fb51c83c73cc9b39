use shopify_client::ShopifyError;
use thiserror::Error;

/// Failures of the verified-contents pipeline.
#[derive(Debug, Error)]
pub enum ContentsError {
    /// Remote lookup failed after the retry policy gave up
    #[error("remote catalog error: {0}")]
    Remote(#[from] ShopifyError),

    /// Local store failure
    #[error("content store error: {0}")]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ContentsError>;

impl ContentsError {
    /// Upstream HTTP status to mirror to the caller, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            ContentsError::Remote(e) => e.status(),
            ContentsError::Store(_) => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ContentsError::Remote(e) => e.code(),
            ContentsError::Store(_) => "CONTENT_STORE_ERROR",
        }
    }
}
