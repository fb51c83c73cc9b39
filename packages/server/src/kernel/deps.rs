//! Server dependencies for the contents pipeline (using traits for testability)
//!
//! This module provides the central dependency container shared by every
//! request. All external services sit behind Base* traits so tests can swap in
//! the mocks from `test_dependencies`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use shopify_client::{Page, ShopifyClient};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domains::contents::models::{ContentRecord, Shop, ShopSession};
use crate::domains::contents::{ReconcileConfig, ReconciliationEngine, VerificationCache};
use crate::kernel::{
    BackoffRetrier, BaseCommerceApi, BaseCommerceApiFactory, BaseContentStore, BaseShopResolver,
    RetryConfig, SlidingWindowLimiter, ThrottledCaller,
};

const PING_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Postgres adapters (implement BaseContentStore / BaseShopResolver)
// =============================================================================

#[derive(Clone)]
pub struct PostgresContentStore {
    pool: PgPool,
}

impl PostgresContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseContentStore for PostgresContentStore {
    async fn fetch_page(
        &self,
        shop_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ContentRecord>> {
        ContentRecord::find_page(shop_id, offset, limit, &self.pool).await
    }

    async fn count(&self, shop_id: Uuid) -> Result<i64> {
        ContentRecord::count_for_shop(shop_id, &self.pool).await
    }

    async fn ping(&self) -> Result<()> {
        tokio::time::timeout(PING_TIMEOUT, sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .context("database ping timed out")?
            .context("database ping failed")?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PostgresShopResolver {
    pool: PgPool,
}

impl PostgresShopResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseShopResolver for PostgresShopResolver {
    async fn find_session(&self, access_token: &str) -> Result<Option<ShopSession>> {
        ShopSession::find_by_access_token(access_token, &self.pool).await
    }

    async fn find_shop(&self, shop_name: &str) -> Result<Option<Shop>> {
        Shop::find_by_name(shop_name, &self.pool).await
    }
}

// =============================================================================
// ShopifyClient Adapter (implements BaseCommerceApi)
// =============================================================================

/// Wrapper around ShopifyClient that implements BaseCommerceApi
pub struct ShopifyAdapter(pub ShopifyClient);

#[async_trait]
impl BaseCommerceApi for ShopifyAdapter {
    async fn list_products_page(&self, page_info: Option<&str>) -> shopify_client::Result<Page> {
        self.0.list_products_page(page_info).await
    }

    async fn list_blogs_page(&self, page_info: Option<&str>) -> shopify_client::Result<Page> {
        self.0.list_blogs_page(page_info).await
    }

    async fn list_articles_page(
        &self,
        blog_id: &str,
        page_info: Option<&str>,
    ) -> shopify_client::Result<Page> {
        self.0.list_articles_page(blog_id, page_info).await
    }

    async fn get_product(&self, id: &str) -> shopify_client::Result<Option<Value>> {
        self.0.get_product(id).await
    }

    async fn get_blog(&self, id: &str) -> shopify_client::Result<Option<Value>> {
        self.0.get_blog(id).await
    }

    async fn get_article(&self, blog_id: &str, id: &str) -> shopify_client::Result<Option<Value>> {
        self.0.get_article(blog_id, id).await
    }
}

/// Builds a [`ShopifyAdapter`] per session, pinned to one API version.
pub struct ShopifyApiFactory {
    api_version: String,
}

impl ShopifyApiFactory {
    pub fn new(api_version: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
        }
    }
}

impl BaseCommerceApiFactory for ShopifyApiFactory {
    fn connect(&self, session: &ShopSession) -> shopify_client::Result<Arc<dyn BaseCommerceApi>> {
        let client = ShopifyClient::with_api_version(
            &session.shop_domain,
            session.access_token.clone(),
            &self.api_version,
        )?;
        Ok(Arc::new(ShopifyAdapter(client)))
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Dependencies shared by every request. The limiter (held by the engine's
/// caller) and the verification cache are process-wide: all in-flight
/// requests draw from one remote quota.
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn BaseContentStore>,
    pub shops: Arc<dyn BaseShopResolver>,
    pub commerce: Arc<dyn BaseCommerceApiFactory>,
    pub engine: Arc<ReconciliationEngine>,
}

impl ServerDeps {
    pub fn new(
        store: Arc<dyn BaseContentStore>,
        shops: Arc<dyn BaseShopResolver>,
        commerce: Arc<dyn BaseCommerceApiFactory>,
        limiter: Arc<SlidingWindowLimiter>,
        retry: RetryConfig,
        reconcile: ReconcileConfig,
    ) -> Self {
        let caller = ThrottledCaller::new(limiter, BackoffRetrier::new(retry));
        let engine = ReconciliationEngine::new(
            store.clone(),
            Arc::new(VerificationCache::new()),
            caller,
            reconcile,
        );

        Self {
            store,
            shops,
            commerce,
            engine: Arc::new(engine),
        }
    }

    /// Production wiring: Postgres for local state, Shopify for the remote.
    pub fn postgres(
        pool: PgPool,
        api_version: impl Into<String>,
        limiter: Arc<SlidingWindowLimiter>,
        retry: RetryConfig,
        reconcile: ReconcileConfig,
    ) -> Self {
        Self::new(
            Arc::new(PostgresContentStore::new(pool.clone())),
            Arc::new(PostgresShopResolver::new(pool)),
            Arc::new(ShopifyApiFactory::new(api_version)),
            limiter,
            retry,
            reconcile,
        )
    }

    pub fn verification_cache(&self) -> &Arc<VerificationCache> {
        self.engine.cache()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::contents::models::ContentCategory;
    use crate::domains::contents::PageRequest;
    use crate::kernel::test_dependencies::{
        MemoryContentStore, MockCommerceApi, MockCommerceApiFactory, MockShopResolver,
    };
    use chrono::Utc;
    use serde_json::json;

    fn session(domain: &str, token: &str) -> ShopSession {
        ShopSession {
            access_token: token.into(),
            shop_domain: domain.into(),
            scope: None,
            expires_at: Some(Utc::now()),
        }
    }

    #[test]
    fn factory_connects_with_valid_credentials() {
        let factory = ShopifyApiFactory::new("2024-01");
        assert!(factory.connect(&session("my-store.myshopify.com", "shpat_x")).is_ok());
    }

    #[test]
    fn factory_rejects_empty_token() {
        let factory = ShopifyApiFactory::new("2024-01");
        assert!(factory.connect(&session("my-store.myshopify.com", "")).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn engine_draws_from_the_injected_limiter() {
        let limiter = Arc::new(SlidingWindowLimiter::new(100, Duration::from_secs(1)));
        let shop_id = Uuid::new_v4();
        let store = MemoryContentStore::new().with_records(
            shop_id,
            vec![ContentRecord::new("1", ContentCategory::Product, json!({ "title": "Mug" }))],
        );
        let api = Arc::new(MockCommerceApi::new().with_product(1));
        let deps = ServerDeps::new(
            Arc::new(store),
            Arc::new(MockShopResolver::new()),
            Arc::new(MockCommerceApiFactory::new(api.clone())),
            limiter.clone(),
            RetryConfig::new(3, Duration::from_millis(10)),
            ReconcileConfig::default(),
        );

        deps.engine
            .reconcile(api.as_ref(), shop_id, PageRequest::new(1, 10))
            .await
            .unwrap();

        // Product page, blog page, one product lookup.
        assert_eq!(api.calls().len(), 3);
        assert_eq!(limiter.in_window().await, api.calls().len());
    }
}
