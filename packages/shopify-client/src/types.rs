use serde_json::Value;

/// Admin API resources the client knows how to list and fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Product,
    Blog,
    Article,
}

impl Resource {
    /// JSON envelope key for a single object (`{"product": {...}}`).
    pub fn singular(&self) -> &'static str {
        match self {
            Resource::Product => "product",
            Resource::Blog => "blog",
            Resource::Article => "article",
        }
    }

    /// JSON envelope key for a listing (`{"products": [...]}`), also the URL segment.
    pub fn plural(&self) -> &'static str {
        match self {
            Resource::Product => "products",
            Resource::Blog => "blogs",
            Resource::Article => "articles",
        }
    }
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    /// `page_info` cursor of the following page; `None` on the last page.
    pub next_page_info: Option<String>,
}
