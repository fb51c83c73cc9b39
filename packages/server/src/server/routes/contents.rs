use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    http::{header::CACHE_CONTROL, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::domains::contents::{assemble, ContentsError, ContentsResponse, PageRequest};
use crate::server::app::AxumAppState;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 250;

fn no_store() -> HeaderValue {
    HeaderValue::from_static("no-store, max-age=0")
}

/// Raw query string. Everything arrives as text so malformed values get this
/// endpoint's error shape instead of the extractor's.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentsQuery {
    pub shop_name: Option<String>,
    pub access_token: Option<String>,
    pub pagination: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug)]
struct ValidatedQuery {
    shop_name: String,
    access_token: String,
    page: PageRequest,
}

impl ContentsQuery {
    fn validate(self) -> Result<ValidatedQuery, ApiError> {
        let shop_name = required(self.shop_name, "shopName")?;
        let access_token = required(self.access_token, "accessToken")?;
        let page = positive(self.pagination.as_deref(), "pagination", DEFAULT_PAGE)?;
        let limit = positive(self.limit.as_deref(), "limit", DEFAULT_LIMIT)?.min(MAX_LIMIT);

        Ok(ValidatedQuery {
            shop_name,
            access_token,
            page: PageRequest::new(page, limit),
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{} is required", name)))
}

fn positive(value: Option<&str>, name: &str, default: u32) -> Result<u32, ApiError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ApiError::bad_request(format!(
            "{} must be a positive integer",
            name
        ))),
    }
}

/// Error body: `{error, details, code}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: Option<String>,
    pub code: &'static str,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>, details: Option<String>, code: &'static str) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                details,
                code,
            },
        }
    }

    fn bad_request(details: String) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid request", Some(details), "INVALID_REQUEST")
    }

    fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            Some("access token has no valid session for this shop".to_string()),
            "UNAUTHORIZED",
        )
    }

    fn shop_not_found(shop_name: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "Shop not found",
            Some(format!("no shop named {}", shop_name)),
            "SHOP_NOT_FOUND",
        )
    }

    fn internal(code: &'static str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None, code)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ContentsError> for ApiError {
    fn from(err: ContentsError) -> Self {
        let status = err
            .upstream_status()
            .and_then(|s| StatusCode::from_u16(s).ok())
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match &err {
            ContentsError::Remote(remote) => {
                error!(error = %remote, status = status.as_u16(), "Contents reconciliation failed");
                Self::new(
                    status,
                    "Failed to fetch contents",
                    Some(remote.to_string()),
                    err.code(),
                )
            }
            ContentsError::Store(store) => {
                error!(error = ?store, "Content store failed");
                Self::internal(err.code())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        response.headers_mut().insert(CACHE_CONTROL, no_store());
        response
    }
}

/// `GET /contents` - verified, paginated contents of one shop
pub async fn contents_handler(
    Extension(state): Extension<AxumAppState>,
    query: Result<Query<ContentsQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    // Extractor rejections (duplicate keys, bad encoding) still get no-store.
    let Query(query) = query.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let query = query.validate()?;
    let deps = &state.deps;

    let session = deps
        .shops
        .find_session(&query.access_token)
        .await
        .map_err(|e| {
            error!(error = ?e, "Session lookup failed");
            ApiError::internal("SESSION_LOOKUP_FAILED")
        })?;
    let session = match session {
        Some(session) if session.is_valid() => session,
        _ => {
            warn!(shop_name = %query.shop_name, "Rejected contents request without a valid session");
            return Err(ApiError::unauthorized());
        }
    };

    let shop = deps
        .shops
        .find_shop(&query.shop_name)
        .await
        .map_err(|e| {
            error!(error = ?e, "Shop lookup failed");
            ApiError::internal("SHOP_LOOKUP_FAILED")
        })?
        .ok_or_else(|| ApiError::shop_not_found(&query.shop_name))?;

    if !session.belongs_to(&shop) {
        warn!(shop_name = %shop.name, "Session belongs to a different shop");
        return Err(ApiError::unauthorized());
    }

    let api = deps.commerce.connect(&session).map_err(|e| {
        error!(error = %e, shop_domain = %session.shop_domain, "Failed to construct remote client");
        ApiError::internal("CLIENT_INIT_FAILED")
    })?;

    let (total, outcome) = tokio::join!(
        deps.store.count(shop.id),
        deps.engine.reconcile(api.as_ref(), shop.id, query.page),
    );
    let total = total.map_err(ContentsError::Store)?;
    let outcome = outcome?;

    info!(
        shop_name = %shop.name,
        page = query.page.page,
        limit = query.page.limit,
        verified = outcome.records.len(),
        total,
        "Served contents page"
    );

    let body = ContentsResponse {
        total,
        groups: assemble(outcome.records),
    };

    let mut response = Json(body).into_response();
    response.headers_mut().insert(CACHE_CONTROL, no_store());
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pagination: Option<&str>, limit: Option<&str>) -> ContentsQuery {
        ContentsQuery {
            shop_name: Some("my-store".into()),
            access_token: Some("shpat_x".into()),
            pagination: pagination.map(String::from),
            limit: limit.map(String::from),
        }
    }

    #[test]
    fn defaults_to_first_page_of_ten() {
        let validated = query(None, None).validate().unwrap();
        assert_eq!(validated.page, PageRequest::new(1, 10));
    }

    #[test]
    fn limit_is_capped() {
        let validated = query(Some("2"), Some("1000")).validate().unwrap();
        assert_eq!(validated.page, PageRequest::new(2, 250));
    }

    #[test]
    fn non_positive_or_garbage_numbers_are_rejected() {
        for (pagination, limit) in [(Some("0"), None), (None, Some("-3")), (Some("abc"), None)] {
            let err = query(pagination, limit).validate().unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn blank_identifiers_are_missing() {
        let mut q = query(None, None);
        q.shop_name = Some("  ".into());
        assert_eq!(q.validate().unwrap_err().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_status_is_mirrored() {
        let err: ApiError = ContentsError::Remote(shopify_client::ShopifyError::Upstream {
            status: 503,
            message: "unavailable".into(),
        })
        .into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err: ApiError = ContentsError::Store(anyhow::anyhow!("db down")).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body.details, None);
    }
}
