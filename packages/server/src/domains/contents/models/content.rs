use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::remote_entity::id_to_string;

/// Content category enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentCategory {
    Product,
    Blog,
    Article,
}

impl std::fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentCategory::Product => write!(f, "PRODUCT"),
            ContentCategory::Blog => write!(f, "BLOG"),
            ContentCategory::Article => write!(f, "ARTICLE"),
        }
    }
}

impl std::str::FromStr for ContentCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PRODUCT" => Ok(ContentCategory::Product),
            "BLOG" => Ok(ContentCategory::Blog),
            "ARTICLE" => Ok(ContentCategory::Article),
            _ => Err(anyhow::anyhow!("Invalid content category: {}", s)),
        }
    }
}

impl TryFrom<String> for ContentCategory {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// ContentRecord - a published product, blog, or article stored locally
///
/// Read-only to reconciliation. `output` is the JSON object rendered for the
/// storefront; articles keep their parent blog id under `blogId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    pub content_id: String,
    #[sqlx(try_from = "String")]
    pub category: ContentCategory,
    pub output: Value,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ContentRecord {
    pub fn new(content_id: impl Into<String>, category: ContentCategory, output: Value) -> Self {
        Self {
            content_id: content_id.into(),
            category,
            output,
            published_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Parent blog id of an article, coerced to a string.
    pub fn parent_blog_id(&self) -> Option<String> {
        ["blogId", "blog_id"]
            .iter()
            .find_map(|key| self.output.get(*key).and_then(id_to_string))
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl ContentRecord {
    /// Page of a shop's records, newest first. Ties break on content id so
    /// repeated calls with a growing limit return a stable prefix.
    pub async fn find_page(
        shop_id: Uuid,
        offset: i64,
        limit: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let records = sqlx::query_as::<_, ContentRecord>(
            r#"
            SELECT content_id, category, output, published_at, created_at, updated_at
            FROM contents
            WHERE shop_id = $1
            ORDER BY created_at DESC, content_id ASC
            OFFSET $2
            LIMIT $3
            "#,
        )
        .bind(shop_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(records)
    }

    pub async fn count_for_shop(shop_id: Uuid, pool: &PgPool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contents WHERE shop_id = $1")
            .bind(shop_id)
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn category_round_trips_through_text() {
        for category in [
            ContentCategory::Product,
            ContentCategory::Blog,
            ContentCategory::Article,
        ] {
            assert_eq!(category.to_string().parse::<ContentCategory>().unwrap(), category);
        }
        assert!("PAGE".parse::<ContentCategory>().is_err());
    }

    #[test]
    fn parent_blog_id_accepts_numbers_and_strings() {
        let numeric = ContentRecord::new("1", ContentCategory::Article, json!({ "blogId": 42 }));
        assert_eq!(numeric.parent_blog_id().as_deref(), Some("42"));

        let snake = ContentRecord::new("2", ContentCategory::Article, json!({ "blog_id": "42" }));
        assert_eq!(snake.parent_blog_id().as_deref(), Some("42"));

        let orphan = ContentRecord::new("3", ContentCategory::Article, json!({ "title": "x" }));
        assert_eq!(orphan.parent_blog_id(), None);
    }
}
