//! Pagination-aware reconciliation of local records against the remote catalog.
//!
//! A page is filled with local records that still exist remotely. When remote
//! deletions thin out a page, the local fetch window for that page grows
//! (`limit * multiplier`) until enough records verify, the local store runs
//! dry, the window covers the whole remote catalog, or the multiplier ceiling
//! or time budget is reached. The result is best effort: a short page is a
//! valid answer.

use std::sync::Arc;
use std::time::Duration;

use shopify_client::ShopifyError;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::catalog::{RemoteCatalog, RemoteCatalogFetcher};
use super::error::{ContentsError, Result};
use super::models::{ContentCategory, ContentRecord, RemoteEntity};
use super::verification::VerificationCache;
use crate::kernel::{BaseCommerceApi, BaseContentStore, BatchRunner, ThrottledCaller};

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Largest `limit` multiple the local fetch window may grow to.
    pub max_multiplier: u32,
    /// Checked between iterations; an iteration in progress always completes.
    pub max_duration: Duration,
    /// Candidates verified concurrently.
    pub verify_chunk_size: usize,
    /// Blogs whose articles are listed concurrently.
    pub article_chunk_size: usize,
    pub article_cooldown: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_multiplier: 4,
            max_duration: Duration::from_secs(30),
            verify_chunk_size: 5,
            article_chunk_size: 2,
            article_cooldown: Duration::from_millis(1000),
        }
    }
}

/// 1-based page of `limit` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    pub fn is_first(&self) -> bool {
        self.page <= 1
    }

    /// Local offset of the page start. Fixed while the window grows.
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePath {
    /// Remote catalog smaller than the page; one fetch at `limit`.
    Direct,
    /// Expansion loop.
    Expanded,
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// Verified records in local order, at most `limit` of them.
    pub records: Vec<ContentRecord>,
    pub path: ReconcilePath,
    pub iterations: u32,
    /// Local fetch window used by the last iteration.
    pub final_limit: usize,
    pub remote_total: usize,
}

pub struct ReconciliationEngine {
    store: Arc<dyn BaseContentStore>,
    cache: Arc<VerificationCache>,
    caller: ThrottledCaller,
    config: ReconcileConfig,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn BaseContentStore>,
        cache: Arc<VerificationCache>,
        caller: ThrottledCaller,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            store,
            cache,
            caller,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<VerificationCache> {
        &self.cache
    }

    pub async fn reconcile(
        &self,
        api: &dyn BaseCommerceApi,
        shop_id: Uuid,
        request: PageRequest,
    ) -> Result<ReconcileOutcome> {
        if request.is_first() {
            self.cache.clear();
            debug!(%shop_id, "First page requested, verification cache cleared");
        }

        let article_batches =
            BatchRunner::new(self.config.article_chunk_size, self.config.article_cooldown);
        let catalog = RemoteCatalogFetcher::new(api, &self.caller, article_batches)
            .fetch_all()
            .await?;

        let remote_total = catalog.total();
        let limit = request.limit as usize;
        let offset = request.offset();

        info!(
            %shop_id,
            page = request.page,
            limit,
            remote_total,
            "Reconciling contents page"
        );

        if remote_total < limit {
            let candidates = self.fetch_candidates(shop_id, offset, limit).await?;
            let mut records = self.verify_candidates(api, &catalog, candidates).await?;
            records.truncate(limit);

            info!(%shop_id, verified = records.len(), "Reconciled page via direct path");
            return Ok(ReconcileOutcome {
                records,
                path: ReconcilePath::Direct,
                iterations: 1,
                final_limit: limit,
                remote_total,
            });
        }

        let started = Instant::now();
        let max_multiplier = self.config.max_multiplier.max(1);
        let mut current_limit = limit;
        let mut multiplier: u32 = 1;
        let mut iterations: u32 = 0;

        let mut records = loop {
            iterations += 1;

            let candidates = self.fetch_candidates(shop_id, offset, current_limit).await?;
            let exhausted = candidates.len() < current_limit;
            let verified = self.verify_candidates(api, &catalog, candidates).await?;

            debug!(
                %shop_id,
                iteration = iterations,
                multiplier,
                current_limit,
                verified = verified.len(),
                exhausted,
                "Reconciliation iteration"
            );

            let enough = verified.len() >= limit;
            let covers_remote = current_limit >= remote_total;
            let at_ceiling = multiplier >= max_multiplier;
            let out_of_time = started.elapsed() >= self.config.max_duration;

            if enough || exhausted || covers_remote || at_ceiling || out_of_time {
                if out_of_time && !enough {
                    info!(%shop_id, iterations, "Reconciliation time budget spent, returning partial page");
                }
                break verified;
            }

            multiplier += 1;
            current_limit = (limit * multiplier as usize).min(remote_total);
        };

        records.truncate(limit);
        info!(
            %shop_id,
            verified = records.len(),
            iterations,
            final_limit = current_limit,
            "Reconciled page via expansion"
        );

        Ok(ReconcileOutcome {
            records,
            path: ReconcilePath::Expanded,
            iterations,
            final_limit: current_limit,
            remote_total,
        })
    }

    async fn fetch_candidates(
        &self,
        shop_id: Uuid,
        offset: i64,
        limit: usize,
    ) -> Result<Vec<ContentRecord>> {
        let records = self
            .store
            .fetch_page(shop_id, offset, limit as i64)
            .await
            .map_err(ContentsError::Store)?;
        Ok(records)
    }

    /// Keep the candidates that exist remotely, preserving local order.
    async fn verify_candidates(
        &self,
        api: &dyn BaseCommerceApi,
        catalog: &RemoteCatalog,
        candidates: Vec<ContentRecord>,
    ) -> Result<Vec<ContentRecord>> {
        let engine = self;
        let checks = BatchRunner::new(self.config.verify_chunk_size, Duration::ZERO)
            .run(candidates, move |record| async move {
                let live = engine.is_live(api, catalog, &record).await?;
                Ok::<_, ShopifyError>((record, live))
            })
            .await;

        let mut verified = Vec::with_capacity(checks.len());
        for check in checks {
            let (record, live) = check?;
            if live {
                verified.push(record);
            } else {
                debug!(
                    content_id = %record.content_id,
                    category = %record.category,
                    "Dropping record missing from remote catalog"
                );
            }
        }
        Ok(verified)
    }

    async fn is_live(
        &self,
        api: &dyn BaseCommerceApi,
        catalog: &RemoteCatalog,
        record: &ContentRecord,
    ) -> std::result::Result<bool, ShopifyError> {
        let found = self
            .cache
            .get_or_lookup(record.category, &record.content_id, || {
                self.lookup(api, catalog, record)
            })
            .await?;
        Ok(found.is_some())
    }

    /// Category-specific remote existence check.
    async fn lookup(
        &self,
        api: &dyn BaseCommerceApi,
        catalog: &RemoteCatalog,
        record: &ContentRecord,
    ) -> std::result::Result<Option<RemoteEntity>, ShopifyError> {
        let id = record.content_id.as_str();

        let found = match record.category {
            ContentCategory::Product => {
                self.caller
                    .call("get_product", move || api.get_product(id))
                    .await?
            }
            ContentCategory::Blog => {
                self.caller
                    .call("get_blog", move || api.get_blog(id))
                    .await?
            }
            ContentCategory::Article => match record.parent_blog_id() {
                Some(blog_id) => {
                    let blog_id = blog_id.as_str();
                    self.caller
                        .call("get_article", move || api.get_article(blog_id, id))
                        .await?
                }
                // Without a parent the platform has no single-article endpoint;
                // the run's listing is authoritative.
                None => return Ok(catalog.find(ContentCategory::Article, id).cloned()),
            },
        };

        Ok(found.map(RemoteEntity::from))
    }
}
