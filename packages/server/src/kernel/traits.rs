// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Reconciliation logic lives in domains/contents and only talks to these traits.
//
// Naming convention: Base* for trait names (e.g., BaseContentStore, BaseCommerceApi)

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use shopify_client::Page;
use uuid::Uuid;

use crate::domains::contents::models::{ContentRecord, Shop, ShopSession};

// =============================================================================
// Content Store Trait (Infrastructure - local records)
// =============================================================================

#[async_trait]
pub trait BaseContentStore: Send + Sync {
    /// Fetch up to `limit` records for a shop starting at `offset`.
    ///
    /// Ordering must be stable across calls so that growing `limit` for the
    /// same `offset` yields a superset of the previous result.
    async fn fetch_page(&self, shop_id: Uuid, offset: i64, limit: i64)
        -> Result<Vec<ContentRecord>>;

    /// Count all records stored for a shop (unverified inventory size).
    async fn count(&self, shop_id: Uuid) -> Result<i64>;

    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Shop Resolver Trait (Infrastructure - shops and remote sessions)
// =============================================================================

#[async_trait]
pub trait BaseShopResolver: Send + Sync {
    /// Look up the remote session that owns an access token.
    async fn find_session(&self, access_token: &str) -> Result<Option<ShopSession>>;

    /// Look up a shop by its name.
    async fn find_shop(&self, shop_name: &str) -> Result<Option<Shop>>;
}

// =============================================================================
// Commerce API Trait (Infrastructure - remote catalog)
// =============================================================================

/// Remote commerce platform operations used by reconciliation.
///
/// Errors keep the remote client's taxonomy so retry decisions can be made
/// on variants, not on status codes.
///
/// Every method maps to exactly one remote request, so each one can be
/// admitted by the rate limiter on its own. Listings are paged: pass the
/// previous page's `next_page_info` to continue.
#[async_trait]
pub trait BaseCommerceApi: Send + Sync {
    async fn list_products_page(&self, page_info: Option<&str>) -> shopify_client::Result<Page>;

    async fn list_blogs_page(&self, page_info: Option<&str>) -> shopify_client::Result<Page>;

    /// Articles of a single blog (the platform cannot list across blogs).
    async fn list_articles_page(
        &self,
        blog_id: &str,
        page_info: Option<&str>,
    ) -> shopify_client::Result<Page>;

    /// `Ok(None)` means the platform confirmed the entity does not exist.
    async fn get_product(&self, id: &str) -> shopify_client::Result<Option<Value>>;

    async fn get_blog(&self, id: &str) -> shopify_client::Result<Option<Value>>;

    async fn get_article(&self, blog_id: &str, id: &str)
        -> shopify_client::Result<Option<Value>>;
}

/// Builds a commerce API client bound to one shop session.
pub trait BaseCommerceApiFactory: Send + Sync {
    fn connect(&self, session: &ShopSession) -> shopify_client::Result<Arc<dyn BaseCommerceApi>>;
}
