//! Seed data shared by the HTTP tests.
//!
//! `my-store` has five local records. Remotely, product 2 was deleted and
//! article 8 lives in blog 99, which was never stored locally.

use chrono::{Duration, Utc};
use serde_json::json;
use server_core::domains::contents::models::{ContentCategory, ContentRecord, Shop};
use server_core::kernel::test_dependencies::{
    test_session, test_shop, MemoryContentStore, MockCommerceApi, MockShopResolver,
};

pub const SHOP_NAME: &str = "my-store";
pub const OTHER_SHOP_NAME: &str = "other-store";

pub const VALID_TOKEN: &str = "shpat_valid";
pub const EXPIRED_TOKEN: &str = "shpat_expired";
pub const OTHER_SHOP_TOKEN: &str = "shpat_other";

pub struct Fixtures {
    pub shop: Shop,
    pub other_shop: Shop,
}

impl Fixtures {
    pub fn new() -> Self {
        Self {
            shop: test_shop(SHOP_NAME),
            other_shop: test_shop(OTHER_SHOP_NAME),
        }
    }

    pub fn shops(&self) -> MockShopResolver {
        let mut expired = test_session(EXPIRED_TOKEN, &self.shop);
        expired.expires_at = Some(Utc::now() - Duration::hours(1));

        MockShopResolver::new()
            .with_shop(self.shop.clone())
            .with_shop(self.other_shop.clone())
            .with_session(test_session(VALID_TOKEN, &self.shop))
            .with_session(expired)
            .with_session(test_session(OTHER_SHOP_TOKEN, &self.other_shop))
    }

    pub fn local_records() -> Vec<ContentRecord> {
        vec![
            ContentRecord::new("1", ContentCategory::Product, json!({ "title": "Mug" })),
            ContentRecord::new("2", ContentCategory::Product, json!({ "title": "Retired mug" })),
            ContentRecord::new("42", ContentCategory::Blog, json!({ "title": "News" })),
            ContentRecord::new(
                "7",
                ContentCategory::Article,
                json!({ "title": "Launch", "blogId": 42 }),
            ),
            ContentRecord::new(
                "8",
                ContentCategory::Article,
                json!({ "title": "Archive", "blogId": "99" }),
            ),
        ]
    }

    pub fn store(&self) -> MemoryContentStore {
        MemoryContentStore::new().with_records(self.shop.id, Self::local_records())
    }

    pub fn commerce() -> MockCommerceApi {
        MockCommerceApi::new()
            .with_product(1)
            .with_blog(42)
            .with_blog(99)
            .with_article(42, 7)
            .with_article(99, 8)
    }
}

impl Default for Fixtures {
    fn default() -> Self {
        Self::new()
    }
}
