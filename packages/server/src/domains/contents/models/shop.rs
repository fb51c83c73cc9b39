use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Shop - a storefront whose published contents are stored locally
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Shop {
    pub id: Uuid,
    pub name: String,
    /// myshopify domain, e.g. `my-store.myshopify.com`
    pub domain: String,
    pub created_at: DateTime<Utc>,
}

/// ShopSession - remote credentials issued to the app for one shop
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShopSession {
    pub access_token: String,
    pub shop_domain: String,
    pub scope: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ShopSession {
    /// Offline sessions never expire.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && self.expires_at.map_or(true, |expires| expires > now)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn belongs_to(&self, shop: &Shop) -> bool {
        self.shop_domain.eq_ignore_ascii_case(&shop.domain)
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Shop {
    pub async fn find_by_name(name: &str, pool: &PgPool) -> Result<Option<Self>> {
        let shop = sqlx::query_as::<_, Shop>(
            "SELECT id, name, domain, created_at FROM shops WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(pool)
        .await?;
        Ok(shop)
    }
}

impl ShopSession {
    pub async fn find_by_access_token(access_token: &str, pool: &PgPool) -> Result<Option<Self>> {
        let session = sqlx::query_as::<_, ShopSession>(
            r#"
            SELECT access_token, shop_domain, scope, expires_at
            FROM shop_sessions
            WHERE access_token = $1
            "#,
        )
        .bind(access_token)
        .fetch_optional(pool)
        .await?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_at: Option<DateTime<Utc>>) -> ShopSession {
        ShopSession {
            access_token: "shpat_test".into(),
            shop_domain: "my-store.myshopify.com".into(),
            scope: None,
            expires_at,
        }
    }

    #[test]
    fn offline_sessions_are_always_valid() {
        assert!(session(None).is_valid());
    }

    #[test]
    fn expired_sessions_are_invalid() {
        let now = Utc::now();
        assert!(!session(Some(now - Duration::minutes(1))).is_valid_at(now));
        assert!(session(Some(now + Duration::minutes(1))).is_valid_at(now));
    }

    #[test]
    fn session_ownership_ignores_case() {
        let shop = Shop {
            id: Uuid::new_v4(),
            name: "my-store".into(),
            domain: "My-Store.myshopify.com".into(),
            created_at: Utc::now(),
        };
        assert!(session(None).belongs_to(&shop));
    }
}
