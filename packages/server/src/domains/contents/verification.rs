//! Memoized remote existence checks.
//!
//! Keys are `CATEGORY:contentId`. A cached `None` records confirmed absence so
//! a deleted entity is not looked up again. Lookups are single-flight per key:
//! concurrent verifications of the same entity share one remote call. Failed
//! lookups are not cached.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use super::models::{ContentCategory, RemoteEntity};

type Slot = Arc<OnceCell<Option<RemoteEntity>>>;

#[derive(Default)]
pub struct VerificationCache {
    entries: DashMap<String, Slot>,
}

impl VerificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(category: ContentCategory, content_id: &str) -> String {
        format!("{}:{}", category, content_id)
    }

    /// Drop every entry. Lookups already in flight finish against their own slot.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of keys with a settled result.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached result without triggering a lookup. Outer `None` means "not cached".
    pub fn peek(&self, category: ContentCategory, content_id: &str) -> Option<Option<RemoteEntity>> {
        self.entries
            .get(&Self::key(category, content_id))
            .and_then(|slot| slot.value().get().cloned())
    }

    /// Return the cached result for the key, or run `lookup` once and cache it.
    pub async fn get_or_lookup<F, Fut, E>(
        &self,
        category: ContentCategory,
        content_id: &str,
        lookup: F,
    ) -> Result<Option<RemoteEntity>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<RemoteEntity>, E>>,
    {
        let slot = self
            .entries
            .entry(Self::key(category, content_id))
            .or_default()
            .value()
            .clone();

        slot.get_or_try_init(lookup).await.cloned()
    }
}
