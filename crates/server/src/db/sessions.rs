//! Durable session backend over the `shop_sessions` table.

use chrono::{DateTime, Utc};
use promo_bridge_core::{AccessScopes, ShopDomain};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

use crate::session::{SessionStore, SessionStoreError, ShopSession};

/// Internal row type for `PostgreSQL` queries.
#[derive(Debug, sqlx::FromRow)]
struct ShopSessionRow {
    shop: ShopDomain,
    access_token: String,
    scope: String,
    obtained_at: DateTime<Utc>,
}

impl From<ShopSessionRow> for ShopSession {
    fn from(row: ShopSessionRow) -> Self {
        Self {
            shop: row.shop,
            access_token: SecretString::from(row.access_token),
            scope: AccessScopes::parse(&row.scope),
            obtained_at: row.obtained_at,
        }
    }
}

/// Summary of a stored session, without the token.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredShop {
    pub shop: ShopDomain,
    pub scope: String,
    pub obtained_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Session store backed by `PostgreSQL`.
///
/// Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool (readiness checks).
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// List every stored shop, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `SessionStoreError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<StoredShop>, SessionStoreError> {
        let rows = sqlx::query_as::<_, StoredShop>(
            r"
            SELECT shop, scope, obtained_at, updated_at
            FROM shop_sessions
            ORDER BY updated_at DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

impl SessionStore for PgSessionStore {
    async fn put(&self, session: ShopSession) -> Result<(), SessionStoreError> {
        sqlx::query(
            r"
            INSERT INTO shop_sessions (shop, access_token, scope, obtained_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (shop) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                scope = EXCLUDED.scope,
                obtained_at = EXCLUDED.obtained_at,
                updated_at = now()
            ",
        )
        .bind(&session.shop)
        .bind(session.access_token.expose_secret())
        .bind(session.scope.to_string())
        .bind(session.obtained_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, shop: &ShopDomain) -> Result<Option<ShopSession>, SessionStoreError> {
        let row = sqlx::query_as::<_, ShopSessionRow>(
            r"
            SELECT shop, access_token, scope, obtained_at
            FROM shop_sessions
            WHERE shop = $1
            ",
        )
        .bind(shop)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ShopSession::from))
    }

    async fn remove(&self, shop: &ShopDomain) -> Result<bool, SessionStoreError> {
        let result = sqlx::query("DELETE FROM shop_sessions WHERE shop = $1")
            .bind(shop)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::{MIGRATOR, create_pool};

    fn session(shop: &ShopDomain, token: &str, scope: &str) -> ShopSession {
        ShopSession {
            shop: shop.clone(),
            access_token: SecretString::from(token),
            scope: AccessScopes::parse(scope),
            obtained_at: Utc::now(),
        }
    }

    /// Run with `DATABASE_URL=postgres://... cargo test -p promo-bridge-server -- --ignored`
    #[tokio::test]
    #[ignore = "requires a PostgreSQL database in DATABASE_URL"]
    async fn test_put_overwrite_remove() {
        let url = SecretString::from(std::env::var("DATABASE_URL").unwrap());
        let pool = create_pool(&url).await.unwrap();
        MIGRATOR.run(&pool).await.unwrap();
        let store = PgSessionStore::new(pool);

        let shop = ShopDomain::parse("pg-session-store-test.myshopify.com").unwrap();
        store.remove(&shop).await.unwrap();
        assert!(store.get(&shop).await.unwrap().is_none());

        store
            .put(session(&shop, "shpat_first", "write_discounts"))
            .await
            .unwrap();
        store
            .put(session(&shop, "shpat_second", "write_discounts,write_price_rules"))
            .await
            .unwrap();

        let found = store.get(&shop).await.unwrap().unwrap();
        assert_eq!(found.access_token.expose_secret(), "shpat_second");
        assert_eq!(found.scope.to_string(), "write_discounts,write_price_rules");

        let listed = store.list().await.unwrap();
        assert_eq!(listed.iter().filter(|s| s.shop == shop).count(), 1);

        assert!(store.remove(&shop).await.unwrap());
        assert!(!store.remove(&shop).await.unwrap());
        assert!(store.get(&shop).await.unwrap().is_none());
    }
}
