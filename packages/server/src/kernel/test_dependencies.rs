// TestDependencies - mock implementations for testing
//
// Provides in-memory stand-ins for every Base* trait so the reconciliation
// pipeline and the HTTP layer can run without Postgres or the remote platform.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use shopify_client::{Page, ShopifyError};
use uuid::Uuid;

use super::{
    BaseCommerceApi, BaseCommerceApiFactory, BaseContentStore, BaseShopResolver, RetryConfig,
    ServerDeps, SlidingWindowLimiter,
};
use crate::domains::contents::models::{id_to_string, ContentRecord, Shop, ShopSession};
use crate::domains::contents::ReconcileConfig;

// =============================================================================
// Memory Content Store
// =============================================================================

/// Records are returned in insertion order, which stands in for the store's
/// stable sort.
pub struct MemoryContentStore {
    records: Arc<Mutex<HashMap<Uuid, Vec<ContentRecord>>>>,
    fetch_calls: Arc<Mutex<Vec<(i64, i64)>>>,
    failure: Option<String>,
    fetch_delay: Duration,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            fetch_calls: Arc::new(Mutex::new(Vec::new())),
            failure: None,
            fetch_delay: Duration::ZERO,
        }
    }

    /// Every page fetch takes `delay` (tokio time, so paused clocks advance).
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn with_records(self, shop_id: Uuid, records: Vec<ContentRecord>) -> Self {
        self.records
            .lock()
            .unwrap()
            .entry(shop_id)
            .or_default()
            .extend(records);
        self
    }

    /// Every operation fails with the given message.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// `(offset, limit)` of every page fetch, in call order
    pub fn fetch_calls(&self) -> Vec<(i64, i64)> {
        self.fetch_calls.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        match &self.failure {
            Some(message) => Err(anyhow::anyhow!("{}", message)),
            None => Ok(()),
        }
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseContentStore for MemoryContentStore {
    async fn fetch_page(
        &self,
        shop_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ContentRecord>> {
        self.fetch_calls.lock().unwrap().push((offset, limit));
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        self.check()?;

        let records = self.records.lock().unwrap();
        Ok(records
            .get(&shop_id)
            .map(|all| {
                all.iter()
                    .skip(offset.max(0) as usize)
                    .take(limit.max(0) as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, shop_id: Uuid) -> Result<i64> {
        self.check()?;
        let records = self.records.lock().unwrap();
        Ok(records.get(&shop_id).map_or(0, |all| all.len() as i64))
    }

    async fn ping(&self) -> Result<()> {
        self.check()
    }
}

// =============================================================================
// Mock Shop Resolver
// =============================================================================

pub struct MockShopResolver {
    shops: Arc<Mutex<Vec<Shop>>>,
    sessions: Arc<Mutex<Vec<ShopSession>>>,
}

impl MockShopResolver {
    pub fn new() -> Self {
        Self {
            shops: Arc::new(Mutex::new(Vec::new())),
            sessions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_shop(self, shop: Shop) -> Self {
        self.shops.lock().unwrap().push(shop);
        self
    }

    pub fn with_session(self, session: ShopSession) -> Self {
        self.sessions.lock().unwrap().push(session);
        self
    }
}

impl Default for MockShopResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseShopResolver for MockShopResolver {
    async fn find_session(&self, access_token: &str) -> Result<Option<ShopSession>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.access_token == access_token)
            .cloned())
    }

    async fn find_shop(&self, shop_name: &str) -> Result<Option<Shop>> {
        Ok(self
            .shops
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.name == shop_name)
            .cloned())
    }
}

/// Shop named `name` on `<name>.myshopify.com`
pub fn test_shop(name: &str) -> Shop {
    Shop {
        id: Uuid::new_v4(),
        name: name.to_string(),
        domain: format!("{}.myshopify.com", name),
        created_at: Utc::now(),
    }
}

/// Offline session for `shop`
pub fn test_session(access_token: &str, shop: &Shop) -> ShopSession {
    ShopSession {
        access_token: access_token.to_string(),
        shop_domain: shop.domain.clone(),
        scope: Some("read_products,read_content".to_string()),
        expires_at: None,
    }
}

// =============================================================================
// Mock Commerce API
// =============================================================================

/// Failure a mock endpoint answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// 4xx other than 429
    Client(u16),
    /// 5xx
    Upstream(u16),
    RateLimited,
}

impl MockFailure {
    fn to_error(self) -> ShopifyError {
        match self {
            MockFailure::Client(status) => ShopifyError::Client {
                status,
                message: "mock client error".to_string(),
            },
            MockFailure::Upstream(status) => ShopifyError::Upstream {
                status,
                message: "mock upstream error".to_string(),
            },
            MockFailure::RateLimited => ShopifyError::RateLimited { retry_after: None },
        }
    }
}

/// Arguments captured from a commerce API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCommerceCall {
    ListProducts { page_info: Option<String> },
    ListBlogs { page_info: Option<String> },
    ListArticles { blog_id: String, page_info: Option<String> },
    GetProduct { id: String },
    GetBlog { id: String },
    GetArticle { blog_id: String, id: String },
}

impl MockCommerceCall {
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            MockCommerceCall::GetProduct { .. }
                | MockCommerceCall::GetBlog { .. }
                | MockCommerceCall::GetArticle { .. }
        )
    }
}

pub struct MockCommerceApi {
    products: Arc<Mutex<Vec<Value>>>,
    blogs: Arc<Mutex<Vec<Value>>>,
    /// (blog id, article)
    articles: Arc<Mutex<Vec<(String, Value)>>>,
    failing_articles: Arc<Mutex<HashMap<String, MockFailure>>>,
    failing_listings: Arc<Mutex<Option<MockFailure>>>,
    throttled_lookups: Arc<Mutex<usize>>,
    /// Cursors whose first request answers 429.
    throttled_pages: Arc<Mutex<HashSet<String>>>,
    page_size: usize,
    calls: Arc<Mutex<Vec<MockCommerceCall>>>,
}

impl MockCommerceApi {
    pub fn new() -> Self {
        Self {
            products: Arc::new(Mutex::new(Vec::new())),
            blogs: Arc::new(Mutex::new(Vec::new())),
            articles: Arc::new(Mutex::new(Vec::new())),
            failing_articles: Arc::new(Mutex::new(HashMap::new())),
            failing_listings: Arc::new(Mutex::new(None)),
            throttled_lookups: Arc::new(Mutex::new(0)),
            throttled_pages: Arc::new(Mutex::new(HashSet::new())),
            page_size: 250,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Listings answer at most `size` items per page. Cursors are the
    /// stringified offset of the next page.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }

    pub fn with_product(self, id: impl Into<Value>) -> Self {
        let id = id.into();
        self.products
            .lock()
            .unwrap()
            .push(json!({ "id": id, "title": format!("Product {}", id) }));
        self
    }

    pub fn with_blog(self, id: impl Into<Value>) -> Self {
        let id = id.into();
        self.blogs
            .lock()
            .unwrap()
            .push(json!({ "id": id, "title": format!("Blog {}", id) }));
        self
    }

    pub fn with_article(self, blog_id: impl Into<Value>, id: impl Into<Value>) -> Self {
        let blog_id = blog_id.into();
        let id = id.into();
        let key = id_to_string(&blog_id).unwrap_or_default();
        self.articles
            .lock()
            .unwrap()
            .push((key, json!({ "id": id, "blog_id": blog_id })));
        self
    }

    /// Listing the articles of `blog_id` fails.
    pub fn with_failing_articles(self, blog_id: impl Into<Value>, failure: MockFailure) -> Self {
        let key = id_to_string(&blog_id.into()).unwrap_or_default();
        self.failing_articles.lock().unwrap().insert(key, failure);
        self
    }

    /// Listing products and blogs fails.
    pub fn with_failing_listings(self, failure: MockFailure) -> Self {
        *self.failing_listings.lock().unwrap() = Some(failure);
        self
    }

    /// The next `count` single-entity lookups answer 429.
    pub fn with_throttled_lookups(self, count: usize) -> Self {
        *self.throttled_lookups.lock().unwrap() = count;
        self
    }

    /// The first listing request carrying `page_info` answers 429.
    pub fn with_throttled_page(self, page_info: impl Into<String>) -> Self {
        self.throttled_pages.lock().unwrap().insert(page_info.into());
        self
    }

    /// Get all calls in the order they were made
    pub fn calls(&self) -> Vec<MockCommerceCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of single-entity lookups, throttled ones included
    pub fn lookup_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.is_lookup())
            .count()
    }

    fn record(&self, call: MockCommerceCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_listing(&self) -> shopify_client::Result<()> {
        match *self.failing_listings.lock().unwrap() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    /// Number of listing page requests, throttled ones included
    pub fn listing_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| !call.is_lookup())
            .count()
    }

    fn paginate(&self, items: Vec<Value>, page_info: Option<&str>) -> shopify_client::Result<Page> {
        if let Some(cursor) = page_info {
            if self.throttled_pages.lock().unwrap().remove(cursor) {
                return Err(MockFailure::RateLimited.to_error());
            }
        }

        let start = match page_info {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| ShopifyError::Client {
                    status: 400,
                    message: format!("invalid page_info: {}", cursor),
                })?,
            None => 0,
        };
        let end = (start + self.page_size).min(items.len());
        let next_page_info = (end < items.len()).then(|| end.to_string());

        Ok(Page {
            items: items.get(start..end).map(<[Value]>::to_vec).unwrap_or_default(),
            next_page_info,
        })
    }

    fn check_throttle(&self) -> shopify_client::Result<()> {
        let mut remaining = self.throttled_lookups.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(MockFailure::RateLimited.to_error());
        }
        Ok(())
    }

    fn find(entities: &[Value], id: &str) -> Option<Value> {
        entities
            .iter()
            .find(|entity| entity.get("id").and_then(id_to_string).as_deref() == Some(id))
            .cloned()
    }
}

impl Default for MockCommerceApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseCommerceApi for MockCommerceApi {
    async fn list_products_page(&self, page_info: Option<&str>) -> shopify_client::Result<Page> {
        self.record(MockCommerceCall::ListProducts {
            page_info: page_info.map(str::to_string),
        });
        self.check_listing()?;
        let products = self.products.lock().unwrap().clone();
        self.paginate(products, page_info)
    }

    async fn list_blogs_page(&self, page_info: Option<&str>) -> shopify_client::Result<Page> {
        self.record(MockCommerceCall::ListBlogs {
            page_info: page_info.map(str::to_string),
        });
        self.check_listing()?;
        let blogs = self.blogs.lock().unwrap().clone();
        self.paginate(blogs, page_info)
    }

    async fn list_articles_page(
        &self,
        blog_id: &str,
        page_info: Option<&str>,
    ) -> shopify_client::Result<Page> {
        self.record(MockCommerceCall::ListArticles {
            blog_id: blog_id.to_string(),
            page_info: page_info.map(str::to_string),
        });
        if let Some(failure) = self.failing_articles.lock().unwrap().get(blog_id) {
            return Err(failure.to_error());
        }
        let articles: Vec<Value> = self
            .articles
            .lock()
            .unwrap()
            .iter()
            .filter(|(parent, _)| parent == blog_id)
            .map(|(_, article)| article.clone())
            .collect();
        self.paginate(articles, page_info)
    }

    async fn get_product(&self, id: &str) -> shopify_client::Result<Option<Value>> {
        self.record(MockCommerceCall::GetProduct { id: id.to_string() });
        self.check_throttle()?;
        Ok(Self::find(&self.products.lock().unwrap(), id))
    }

    async fn get_blog(&self, id: &str) -> shopify_client::Result<Option<Value>> {
        self.record(MockCommerceCall::GetBlog { id: id.to_string() });
        self.check_throttle()?;
        Ok(Self::find(&self.blogs.lock().unwrap(), id))
    }

    async fn get_article(&self, blog_id: &str, id: &str) -> shopify_client::Result<Option<Value>> {
        self.record(MockCommerceCall::GetArticle {
            blog_id: blog_id.to_string(),
            id: id.to_string(),
        });
        self.check_throttle()?;
        let articles = self.articles.lock().unwrap();
        let in_blog: Vec<Value> = articles
            .iter()
            .filter(|(parent, _)| parent == blog_id)
            .map(|(_, article)| article.clone())
            .collect();
        Ok(Self::find(&in_blog, id))
    }
}

// =============================================================================
// Mock Commerce API Factory
// =============================================================================

pub struct MockCommerceApiFactory {
    api: Arc<MockCommerceApi>,
    fail_connect: bool,
    connected_domains: Arc<Mutex<Vec<String>>>,
}

impl MockCommerceApiFactory {
    pub fn new(api: Arc<MockCommerceApi>) -> Self {
        Self {
            api,
            fail_connect: false,
            connected_domains: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Client construction fails for every session.
    pub fn failing(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn connected_domains(&self) -> Vec<String> {
        self.connected_domains.lock().unwrap().clone()
    }
}

impl BaseCommerceApiFactory for MockCommerceApiFactory {
    fn connect(&self, session: &ShopSession) -> shopify_client::Result<Arc<dyn BaseCommerceApi>> {
        if self.fail_connect {
            return Err(ShopifyError::Config("mock client construction failed".to_string()));
        }
        self.connected_domains
            .lock()
            .unwrap()
            .push(session.shop_domain.clone());
        let api: Arc<dyn BaseCommerceApi> = self.api.clone();
        Ok(api)
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub store: Arc<MemoryContentStore>,
    pub shops: Arc<MockShopResolver>,
    pub commerce: Arc<MockCommerceApi>,
    pub commerce_factory: Arc<MockCommerceApiFactory>,
}

impl TestDependencies {
    pub fn new() -> Self {
        let commerce = Arc::new(MockCommerceApi::new());
        Self {
            store: Arc::new(MemoryContentStore::new()),
            shops: Arc::new(MockShopResolver::new()),
            commerce_factory: Arc::new(MockCommerceApiFactory::new(commerce.clone())),
            commerce,
        }
    }

    /// Set a mock content store
    pub fn mock_store(mut self, store: MemoryContentStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    /// Set a mock shop resolver
    pub fn mock_shops(mut self, shops: MockShopResolver) -> Self {
        self.shops = Arc::new(shops);
        self
    }

    /// Set a mock commerce API; the factory hands it to every session
    pub fn mock_commerce(mut self, api: MockCommerceApi) -> Self {
        self.commerce = Arc::new(api);
        self.commerce_factory = Arc::new(MockCommerceApiFactory::new(self.commerce.clone()));
        self
    }

    /// Set a mock commerce API factory
    pub fn mock_commerce_factory(mut self, factory: MockCommerceApiFactory) -> Self {
        self.commerce_factory = Arc::new(factory);
        self
    }

    /// Convert into ServerDeps with a generous limiter and no backoff jitter
    pub fn into_deps(self) -> Arc<ServerDeps> {
        Arc::new(ServerDeps::new(
            self.store,
            self.shops,
            self.commerce_factory,
            Arc::new(SlidingWindowLimiter::new(1000, Duration::from_secs(1))),
            RetryConfig::new(3, Duration::from_millis(10))
                .with_max_jitter(Duration::ZERO),
            ReconcileConfig {
                article_cooldown: Duration::ZERO,
                ..ReconcileConfig::default()
            },
        ))
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
