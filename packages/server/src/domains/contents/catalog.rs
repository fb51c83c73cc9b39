//! Full listing of the remote catalog for one shop.
//!
//! Products and blogs are listed directly. Articles can only be listed per
//! blog, so they fan out through a [`BatchRunner`] with a small chunk size and
//! a cooldown. A failed article listing for one blog is tolerated (logged,
//! treated as empty) unless the failure is a client error.
//!
//! Listings are walked page by page here rather than inside the client, so
//! every page request takes its own limiter slot and a throttled page is
//! retried alone.

use std::future::Future;

use serde_json::Value;
use shopify_client::{Page, ShopifyError};
use tracing::{debug, info, warn};

use super::models::{ContentCategory, RemoteEntity};
use crate::kernel::{BaseCommerceApi, BatchRunner, Classify, ErrorClass, ThrottledCaller};

/// Snapshot of every entity the remote platform currently lists.
#[derive(Debug, Clone, Default)]
pub struct RemoteCatalog {
    pub products: Vec<RemoteEntity>,
    pub blogs: Vec<RemoteEntity>,
    pub articles: Vec<RemoteEntity>,
}

impl RemoteCatalog {
    pub fn total(&self) -> usize {
        self.products.len() + self.blogs.len() + self.articles.len()
    }

    pub fn entities(&self, category: ContentCategory) -> &[RemoteEntity] {
        match category {
            ContentCategory::Product => &self.products,
            ContentCategory::Blog => &self.blogs,
            ContentCategory::Article => &self.articles,
        }
    }

    pub fn find(&self, category: ContentCategory, content_id: &str) -> Option<&RemoteEntity> {
        self.entities(category)
            .iter()
            .find(|entity| entity.id_string().as_deref() == Some(content_id))
    }
}

pub struct RemoteCatalogFetcher<'a> {
    api: &'a dyn BaseCommerceApi,
    caller: &'a ThrottledCaller,
    article_batches: BatchRunner,
}

impl<'a> RemoteCatalogFetcher<'a> {
    pub fn new(
        api: &'a dyn BaseCommerceApi,
        caller: &'a ThrottledCaller,
        article_batches: BatchRunner,
    ) -> Self {
        Self {
            api,
            caller,
            article_batches,
        }
    }

    pub async fn fetch_all(&self) -> Result<RemoteCatalog, ShopifyError> {
        let api = self.api;

        let products = self
            .list_pages("list_products", move |cursor: Option<String>| async move {
                api.list_products_page(cursor.as_deref()).await
            })
            .await?;
        let blogs = self
            .list_pages("list_blogs", move |cursor: Option<String>| async move {
                api.list_blogs_page(cursor.as_deref()).await
            })
            .await?;

        let blogs: Vec<RemoteEntity> = blogs.into_iter().map(RemoteEntity::from).collect();
        let blog_ids: Vec<String> = blogs.iter().filter_map(RemoteEntity::id_string).collect();

        let fetcher = self;
        let per_blog = self
            .article_batches
            .run(blog_ids, move |blog_id| fetcher.list_articles_tolerant(blog_id))
            .await;

        let mut articles = Vec::new();
        for listing in per_blog {
            articles.extend(listing?.into_iter().map(RemoteEntity::from));
        }

        let catalog = RemoteCatalog {
            products: products.into_iter().map(RemoteEntity::from).collect(),
            blogs,
            articles,
        };

        info!(
            products = catalog.products.len(),
            blogs = catalog.blogs.len(),
            articles = catalog.articles.len(),
            "Fetched remote catalog"
        );

        Ok(catalog)
    }

    async fn list_articles_tolerant(&self, blog_id: String) -> Result<Vec<Value>, ShopifyError> {
        let api = self.api;
        let id = blog_id.as_str();

        let listing = self
            .list_pages("list_articles", move |cursor: Option<String>| async move {
                api.list_articles_page(id, cursor.as_deref()).await
            })
            .await;

        match listing {
            Ok(articles) => Ok(articles),
            Err(e) if e.classify() == ErrorClass::NonRetryable => Err(e),
            Err(e) => {
                warn!(blog_id = %blog_id, error = %e, "Article listing failed, treating blog as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Follow a listing's cursor to the last page. Each page is one throttled
    /// call; a failure on page k does not repeat pages before it.
    async fn list_pages<F, Fut>(
        &self,
        operation_name: &str,
        mut fetch_page: F,
    ) -> Result<Vec<Value>, ShopifyError>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page, ShopifyError>>,
    {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages: u32 = 0;

        loop {
            let page = self
                .caller
                .call(operation_name, || fetch_page(cursor.clone()))
                .await?;
            pages += 1;
            items.extend(page.items);

            match page.next_page_info {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(operation = operation_name, pages, count = items.len(), "Listing complete");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::{MockCommerceApi, MockCommerceCall, MockFailure};
    use crate::kernel::{BackoffRetrier, RetryConfig, SlidingWindowLimiter};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn caller_with(limiter: Arc<SlidingWindowLimiter>) -> ThrottledCaller {
        ThrottledCaller::new(
            limiter,
            BackoffRetrier::new(
                RetryConfig::new(3, Duration::from_millis(10)).with_max_jitter(Duration::ZERO),
            ),
        )
    }

    fn caller() -> ThrottledCaller {
        caller_with(Arc::new(SlidingWindowLimiter::new(100, Duration::from_secs(1))))
    }

    fn articles() -> BatchRunner {
        BatchRunner::new(2, Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn lists_every_category() {
        let api = MockCommerceApi::new()
            .with_product(1)
            .with_product(2)
            .with_blog(10)
            .with_article(10, 100)
            .with_article(10, 101);
        let caller = caller();

        let catalog = RemoteCatalogFetcher::new(&api, &caller, articles())
            .fetch_all()
            .await
            .unwrap();

        assert_eq!(catalog.products.len(), 2);
        assert_eq!(catalog.blogs.len(), 1);
        assert_eq!(catalog.articles.len(), 2);
        assert_eq!(catalog.total(), 5);
        assert!(catalog.find(ContentCategory::Article, "101").is_some());
        assert!(catalog.find(ContentCategory::Product, "101").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn every_listing_page_takes_its_own_limiter_slot() {
        let limiter = Arc::new(SlidingWindowLimiter::new(100, Duration::from_secs(1)));
        let api = MockCommerceApi::new()
            .with_page_size(2)
            .with_product(1)
            .with_product(2)
            .with_product(3)
            .with_product(4)
            .with_product(5)
            .with_blog(1)
            .with_blog(2)
            .with_blog(3)
            .with_article(1, 11)
            .with_article(1, 12)
            .with_article(1, 13)
            .with_article(2, 21);
        let caller = caller_with(limiter.clone());

        let catalog = RemoteCatalogFetcher::new(&api, &caller, articles())
            .fetch_all()
            .await
            .unwrap();

        assert_eq!(catalog.products.len(), 5);
        assert_eq!(catalog.blogs.len(), 3);
        assert_eq!(catalog.articles.len(), 4);
        // products 3 pages, blogs 2, articles 2 + 1 + 1
        assert_eq!(api.listing_count(), 9);
        assert_eq!(limiter.in_window().await, api.listing_count());
    }

    #[tokio::test(start_paused = true)]
    async fn paged_listing_stays_within_the_rate_window() {
        let limiter = Arc::new(SlidingWindowLimiter::new(1, Duration::from_secs(1)));
        let api = MockCommerceApi::new()
            .with_page_size(1)
            .with_product(1)
            .with_product(2)
            .with_product(3)
            .with_product(4);
        let caller = caller_with(limiter);
        let started = Instant::now();

        let catalog = RemoteCatalogFetcher::new(&api, &caller, articles())
            .fetch_all()
            .await
            .unwrap();

        assert_eq!(catalog.products.len(), 4);
        // Four product pages and one blog page, one admission per second.
        assert_eq!(api.listing_count(), 5);
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_page_is_retried_alone() {
        let api = MockCommerceApi::new()
            .with_page_size(1)
            .with_product(1)
            .with_product(2)
            .with_product(3)
            .with_throttled_page("1");
        let caller = caller();

        let catalog = RemoteCatalogFetcher::new(&api, &caller, articles())
            .fetch_all()
            .await
            .unwrap();

        assert_eq!(catalog.products.len(), 3);
        let product_cursors: Vec<Option<String>> = api
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCommerceCall::ListProducts { page_info } => Some(page_info),
                _ => None,
            })
            .collect();
        assert_eq!(
            product_cursors,
            vec![None, Some("1".to_string()), Some("1".to_string()), Some("2".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn one_failing_blog_does_not_abort_the_listing() {
        let api = MockCommerceApi::new()
            .with_blog(1)
            .with_blog(2)
            .with_blog(3)
            .with_article(1, 11)
            .with_article(2, 21)
            .with_article(3, 31)
            .with_failing_articles(2, MockFailure::Upstream(500));
        let caller = caller();

        let catalog = RemoteCatalogFetcher::new(&api, &caller, articles())
            .fetch_all()
            .await
            .unwrap();

        let ids: Vec<String> = catalog
            .articles
            .iter()
            .filter_map(RemoteEntity::id_string)
            .collect();
        assert_eq!(ids, vec!["11", "31"]);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_on_a_blog_propagate() {
        let api = MockCommerceApi::new()
            .with_blog(1)
            .with_failing_articles(1, MockFailure::Client(403));
        let caller = caller();

        let result = RemoteCatalogFetcher::new(&api, &caller, articles())
            .fetch_all()
            .await;

        assert!(matches!(result, Err(ShopifyError::Client { status: 403, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn top_level_failures_propagate() {
        let api = MockCommerceApi::new().with_failing_listings(MockFailure::Upstream(503));
        let caller = caller();

        let result = RemoteCatalogFetcher::new(&api, &caller, articles())
            .fetch_all()
            .await;

        assert!(matches!(result, Err(ShopifyError::Upstream { status: 503, .. })));
    }
}
