//! Shape verified records into the grouped response body.

use serde::Serialize;
use serde_json::{Map, Value};

use super::models::{ContentCategory, ContentRecord};

/// `{contentId, category, ...output}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEntry {
    pub content_id: String,
    pub category: ContentCategory,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ContentEntry {
    fn from_record(record: ContentRecord) -> Self {
        let mut fields = match record.output {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("output".to_string(), other);
                map
            }
        };
        // Identity comes from the record, not from whatever the output carries.
        fields.remove("contentId");
        fields.remove("category");

        Self {
            content_id: record.content_id,
            category: record.category,
            fields,
        }
    }
}

/// Article entry with its parent blog denormalized, or `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleEntry {
    #[serde(flatten)]
    pub entry: ContentEntry,
    pub blog: Option<ContentEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupedContents {
    pub products: Vec<ContentEntry>,
    pub blogs: Vec<ContentEntry>,
    pub articles: Vec<ArticleEntry>,
}

/// Body of a successful `GET /contents`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentsResponse {
    /// Raw local inventory size, independent of verification.
    pub total: i64,
    #[serde(flatten)]
    pub groups: GroupedContents,
}

/// Group records by category, keeping their order within each group, and
/// link every article to a blog of the same result by id.
pub fn assemble(records: Vec<ContentRecord>) -> GroupedContents {
    let mut grouped = GroupedContents::default();
    let mut pending_articles = Vec::new();

    for record in records {
        match record.category {
            ContentCategory::Product => grouped.products.push(ContentEntry::from_record(record)),
            ContentCategory::Blog => grouped.blogs.push(ContentEntry::from_record(record)),
            ContentCategory::Article => {
                let parent = record.parent_blog_id();
                let mut entry = ContentEntry::from_record(record);
                entry.fields.remove("blog");
                pending_articles.push((entry, parent));
            }
        }
    }

    grouped.articles = pending_articles
        .into_iter()
        .map(|(entry, parent)| {
            let blog = parent.and_then(|blog_id| {
                grouped
                    .blogs
                    .iter()
                    .find(|blog| blog.content_id == blog_id)
                    .cloned()
            });
            ArticleEntry { entry, blog }
        })
        .collect();

    grouped
}
