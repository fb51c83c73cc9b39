//! Verified contents listing: local records filtered to what still exists
//! on the remote commerce platform.

pub mod assemble;
pub mod catalog;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod verification;

pub use assemble::{assemble, ArticleEntry, ContentEntry, ContentsResponse, GroupedContents};
pub use catalog::{RemoteCatalog, RemoteCatalogFetcher};
pub use error::{ContentsError, Result};
pub use models::*;
pub use reconcile::{
    PageRequest, ReconcileConfig, ReconcileOutcome, ReconcilePath, ReconciliationEngine,
};
pub use verification::VerificationCache;
