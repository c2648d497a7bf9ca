//! In-memory session backend.

use std::collections::HashMap;
use std::sync::Arc;

use promo_bridge_core::ShopDomain;
use tokio::sync::RwLock;

use super::{SessionStore, SessionStoreError, ShopSession};

/// Process-local session map. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<ShopDomain, ShopSession>>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns true if no shop is stored.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    async fn put(&self, session: ShopSession) -> Result<(), SessionStoreError> {
        self.sessions
            .write()
            .await
            .insert(session.shop.clone(), session);
        Ok(())
    }

    async fn get(&self, shop: &ShopDomain) -> Result<Option<ShopSession>, SessionStoreError> {
        Ok(self.sessions.read().await.get(shop).cloned())
    }

    async fn remove(&self, shop: &ShopDomain) -> Result<bool, SessionStoreError> {
        Ok(self.sessions.write().await.remove(shop).is_some())
    }
}
