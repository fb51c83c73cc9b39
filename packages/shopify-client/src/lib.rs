//! Pure Shopify Admin REST API client.
//!
//! A minimal client for the Shopify Admin API. Supports listing and fetching
//! products, blogs, and articles. Listings are exposed one page at a time:
//! every method issues exactly one HTTP request, and the caller walks the
//! `page_info` cursor taken from the `Link` header.
//!
//! Entities are returned as raw JSON: the client carries no opinion about
//! which fields matter to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use shopify_client::ShopifyClient;
//!
//! let client = ShopifyClient::new("my-store", "shpat_xxx")?;
//!
//! let first = client.list_products_page(None).await?;
//! if let Some(cursor) = first.next_page_info.as_deref() {
//!     let second = client.list_products_page(Some(cursor)).await?;
//! }
//! let article = client.get_article("42", "1001").await?;
//! ```

pub mod error;
pub mod types;

pub use error::{Result, ShopifyError};
pub use types::{Page, Resource};

use std::time::Duration;

use reqwest::header::{HeaderMap, LINK, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde_json::Value;

pub const DEFAULT_API_VERSION: &str = "2024-01";

/// Largest page size Shopify accepts on list endpoints.
const PAGE_LIMIT: u32 = 250;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

#[derive(Clone)]
pub struct ShopifyClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl ShopifyClient {
    /// Create a client for `shop_domain` using the default API version.
    ///
    /// `shop_domain` may be a bare handle (`my-store`), a myshopify domain, or
    /// a URL; it is normalized to `https://<handle>.myshopify.com`.
    pub fn new(shop_domain: &str, access_token: impl Into<String>) -> Result<Self> {
        Self::with_api_version(shop_domain, access_token, DEFAULT_API_VERSION)
    }

    pub fn with_api_version(
        shop_domain: &str,
        access_token: impl Into<String>,
        api_version: &str,
    ) -> Result<Self> {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(ShopifyError::Config("access token is empty".into()));
        }

        let host = normalize_shop_domain(shop_domain)?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ShopifyError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: format!("https://{}/admin/api/{}", host, api_version),
            access_token,
        })
    }

    /// Point the client at a different base URL (proxies, local fakes).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn list_products_page(&self, page_info: Option<&str>) -> Result<Page> {
        let url = self.listing_url("products", page_info);
        self.list_page(&url, Resource::Product).await
    }

    pub async fn list_blogs_page(&self, page_info: Option<&str>) -> Result<Page> {
        let url = self.listing_url("blogs", page_info);
        self.list_page(&url, Resource::Blog).await
    }

    /// One page of a blog's articles. Shopify has no cross-blog article listing.
    pub async fn list_articles_page(&self, blog_id: &str, page_info: Option<&str>) -> Result<Page> {
        let url = self.listing_url(&format!("blogs/{}/articles", blog_id), page_info);
        self.list_page(&url, Resource::Article).await
    }

    /// Fetch a product. `Ok(None)` means Shopify answered 404.
    pub async fn get_product(&self, id: &str) -> Result<Option<Value>> {
        let url = format!("{}/products/{}.json", self.base_url, id);
        self.get_one(url, Resource::Product).await
    }

    pub async fn get_blog(&self, id: &str) -> Result<Option<Value>> {
        let url = format!("{}/blogs/{}.json", self.base_url, id);
        self.get_one(url, Resource::Blog).await
    }

    pub async fn get_article(&self, blog_id: &str, article_id: &str) -> Result<Option<Value>> {
        let url = format!(
            "{}/blogs/{}/articles/{}.json",
            self.base_url, blog_id, article_id
        );
        self.get_one(url, Resource::Article).await
    }

    /// Shopify rejects filters next to `page_info`; only `limit` may accompany it.
    fn listing_url(&self, path: &str, page_info: Option<&str>) -> String {
        match page_info {
            Some(cursor) => format!(
                "{}/{}.json?limit={}&page_info={}",
                self.base_url, path, PAGE_LIMIT, cursor
            ),
            None => format!("{}/{}.json?limit={}", self.base_url, path, PAGE_LIMIT),
        }
    }

    async fn list_page(&self, url: &str, resource: Resource) -> Result<Page> {
        let resp = self.send(url).await?;
        let resp = check_status(resp).await?;
        let next_page_info = next_page_url(resp.headers()).and_then(|next| page_info_of(&next));

        let body: Value = resp.json().await?;
        let items = match take_field(body, resource.plural())? {
            Value::Array(items) => items,
            other => {
                return Err(ShopifyError::Parse(format!(
                    "expected array under '{}', got {}",
                    resource.plural(),
                    other
                )))
            }
        };

        tracing::debug!(
            resource = resource.plural(),
            count = items.len(),
            has_next = next_page_info.is_some(),
            "Listed Shopify page"
        );
        Ok(Page {
            items,
            next_page_info,
        })
    }

    async fn get_one(&self, url: String, resource: Resource) -> Result<Option<Value>> {
        let resp = self.send(&url).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let resp = check_status(resp).await?;
        let body: Value = resp.json().await?;
        take_field(body, resource.singular()).map(Some)
    }

    async fn send(&self, url: &str) -> Result<Response> {
        let resp = self
            .client
            .get(url)
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .send()
            .await?;
        Ok(resp)
    }
}

/// Map non-success responses onto the error taxonomy.
async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = parse_retry_after(resp.headers());
        tracing::debug!(?retry_after, "Shopify returned 429");
        return Err(ShopifyError::RateLimited { retry_after });
    }

    let message = resp.text().await.unwrap_or_default();
    if status.is_client_error() {
        Err(ShopifyError::Client {
            status: status.as_u16(),
            message,
        })
    } else {
        Err(ShopifyError::Upstream {
            status: status.as_u16(),
            message,
        })
    }
}

fn take_field(mut body: Value, key: &str) -> Result<Value> {
    body.get_mut(key)
        .map(Value::take)
        .ok_or_else(|| ShopifyError::Parse(format!("missing '{}' in response", key)))
}

/// Shopify sends `Retry-After` in (possibly fractional) seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let secs: f64 = raw.trim().parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

/// Extract the `rel="next"` target from a `Link` header.
fn next_page_url(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',')
        .find(|part| part.contains("rel=\"next\""))
        .and_then(|part| {
            let start = part.find('<')? + 1;
            let end = part.find('>')?;
            (start < end).then(|| part[start..end].to_string())
        })
}

/// Pull the `page_info` query parameter out of a pagination URL.
fn page_info_of(url: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("page_info="))
        .filter(|cursor| !cursor.is_empty())
        .map(str::to_string)
}

fn normalize_shop_domain(raw: &str) -> Result<String> {
    let trimmed = raw
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');

    if trimmed.is_empty() {
        return Err(ShopifyError::Config("shop domain is empty".into()));
    }

    let valid = trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if !valid {
        return Err(ShopifyError::Config(format!(
            "invalid shop domain: {}",
            raw
        )));
    }

    if trimmed.contains('.') {
        Ok(trimmed.to_ascii_lowercase())
    } else {
        Ok(format!("{}.myshopify.com", trimmed.to_ascii_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn normalizes_shop_domains() {
        assert_eq!(normalize_shop_domain("my-store").unwrap(), "my-store.myshopify.com");
        assert_eq!(
            normalize_shop_domain("https://My-Store.myshopify.com/").unwrap(),
            "my-store.myshopify.com"
        );
        assert!(normalize_shop_domain("").is_err());
        assert!(normalize_shop_domain("bad store/../x").is_err());
    }

    #[test]
    fn rejects_empty_access_token() {
        assert!(matches!(
            ShopifyClient::new("my-store", "  "),
            Err(ShopifyError::Config(_))
        ));
    }

    #[test]
    fn builds_versioned_base_url() {
        let client = ShopifyClient::with_api_version("my-store", "token", "2023-10").unwrap();
        assert_eq!(
            client.base_url(),
            "https://my-store.myshopify.com/admin/api/2023-10"
        );
    }

    #[test]
    fn finds_next_link() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://s.myshopify.com/admin/api/2024-01/products.json?page_info=a>; rel=\"previous\", \
                 <https://s.myshopify.com/admin/api/2024-01/products.json?page_info=b>; rel=\"next\"",
            ),
        );
        assert_eq!(
            next_page_url(&headers).as_deref(),
            Some("https://s.myshopify.com/admin/api/2024-01/products.json?page_info=b")
        );

        let mut last_page = HeaderMap::new();
        last_page.insert(
            LINK,
            HeaderValue::from_static("<https://s.myshopify.com/x?page_info=a>; rel=\"previous\""),
        );
        assert_eq!(next_page_url(&last_page), None);
    }

    #[test]
    fn extracts_page_info_cursor() {
        assert_eq!(
            page_info_of("https://s.myshopify.com/admin/api/2024-01/products.json?limit=250&page_info=eyJsYXN0X2lkIjo0fQ")
                .as_deref(),
            Some("eyJsYXN0X2lkIjo0fQ")
        );
        assert_eq!(page_info_of("https://s.myshopify.com/products.json?limit=250"), None);
        assert_eq!(page_info_of("https://s.myshopify.com/products.json?page_info="), None);
    }

    #[test]
    fn listing_urls_carry_only_limit_next_to_the_cursor() {
        let client = ShopifyClient::new("my-store", "token")
            .unwrap()
            .with_base_url("http://localhost:9000/admin/api/2024-01/");

        assert_eq!(
            client.listing_url("products", None),
            "http://localhost:9000/admin/api/2024-01/products.json?limit=250"
        );
        assert_eq!(
            client.listing_url("blogs/42/articles", Some("abc")),
            "http://localhost:9000/admin/api/2024-01/blogs/42/articles.json?limit=250&page_info=abc"
        );
    }

    #[test]
    fn parses_fractional_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("2.0"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(2)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn takes_envelope_field() {
        let body = serde_json::json!({ "product": { "id": 7 } });
        assert_eq!(take_field(body, "product").unwrap()["id"], 7);

        let missing = serde_json::json!({ "errors": "Not Found" });
        assert!(matches!(take_field(missing, "product"), Err(ShopifyError::Parse(_))));
    }
}
