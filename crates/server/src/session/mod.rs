//! Per-shop session storage.
//!
//! A [`ShopSession`] is written when OAuth completes, read on every
//! authenticated request and removed when the shop uninstalls the app.
//!
//! # Backends
//!
//! - [`MemorySessionStore`] - process-local map, lost on restart
//! - [`PgSessionStore`](crate::db::PgSessionStore) - `shop_sessions` table, used when `DATABASE_URL` is set
//!
//! Handlers hold a [`Sessions`], which dispatches to whichever backend was
//! chosen at start-up.

mod memory;

use std::future::Future;

use chrono::{DateTime, Utc};
use promo_bridge_core::{AccessScopes, ShopDomain};
use secrecy::SecretString;
use thiserror::Error;

use crate::db::PgSessionStore;
use crate::shopify::OAuthToken;

pub use memory::MemorySessionStore;

/// Errors raised by a session backend.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// An installed shop's API credentials.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct ShopSession {
    /// Shop the session belongs to.
    pub shop: ShopDomain,
    /// Offline access token (HIGH PRIVILEGE - redacted in debug output).
    pub access_token: SecretString,
    /// Scopes the merchant granted.
    pub scope: AccessScopes,
    /// When the token was obtained.
    pub obtained_at: DateTime<Utc>,
}

impl std::fmt::Debug for ShopSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopSession")
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

impl From<OAuthToken> for ShopSession {
    fn from(token: OAuthToken) -> Self {
        Self {
            shop: token.shop,
            access_token: token.access_token,
            scope: token.scope,
            obtained_at: token.obtained_at,
        }
    }
}

/// Shop → session mapping.
///
/// `put` overwrites any existing entry for the shop. `remove` returns whether
/// an entry existed; removing an absent shop is not an error.
pub trait SessionStore: Send + Sync {
    /// Insert or replace the session for `session.shop`.
    fn put(&self, session: ShopSession) -> impl Future<Output = Result<(), SessionStoreError>> + Send;

    /// Look up the session for `shop`.
    fn get(
        &self,
        shop: &ShopDomain,
    ) -> impl Future<Output = Result<Option<ShopSession>, SessionStoreError>> + Send;

    /// Forget `shop`.
    fn remove(&self, shop: &ShopDomain) -> impl Future<Output = Result<bool, SessionStoreError>> + Send;
}

/// The session backend selected at start-up.
#[derive(Clone)]
pub enum Sessions {
    Memory(MemorySessionStore),
    Postgres(PgSessionStore),
}

impl Sessions {
    /// Backend name, for logs.
    #[must_use]
    pub const fn backend(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Postgres(_) => "postgres",
        }
    }
}

impl Default for Sessions {
    fn default() -> Self {
        Self::Memory(MemorySessionStore::new())
    }
}

impl SessionStore for Sessions {
    async fn put(&self, session: ShopSession) -> Result<(), SessionStoreError> {
        match self {
            Self::Memory(store) => store.put(session).await,
            Self::Postgres(store) => store.put(session).await,
        }
    }

    async fn get(&self, shop: &ShopDomain) -> Result<Option<ShopSession>, SessionStoreError> {
        match self {
            Self::Memory(store) => store.get(shop).await,
            Self::Postgres(store) => store.get(shop).await,
        }
    }

    async fn remove(&self, shop: &ShopDomain) -> Result<bool, SessionStoreError> {
        match self {
            Self::Memory(store) => store.remove(shop).await,
            Self::Postgres(store) => store.remove(shop).await,
        }
    }
}
