//! Shop session maintenance.
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

use promo_bridge_core::ShopDomain;
use promo_bridge_server::db::PgSessionStore;
use promo_bridge_server::session::SessionStore;

use super::{CommandError, connect};

/// Log every stored session, most recently updated first.
pub async fn list() -> Result<(), CommandError> {
    let store = PgSessionStore::new(connect().await?);
    let shops = store.list().await?;

    if shops.is_empty() {
        tracing::info!("No installed shops");
        return Ok(());
    }

    for shop in &shops {
        tracing::info!(
            "{}  scope={}  obtained={}  updated={}",
            shop.shop,
            shop.scope,
            shop.obtained_at.to_rfc3339(),
            shop.updated_at.to_rfc3339()
        );
    }
    tracing::info!("{} shop(s)", shops.len());
    Ok(())
}

/// Remove the session for `shop`.
pub async fn remove(shop: &str) -> Result<(), CommandError> {
    let shop = ShopDomain::parse(shop)?;
    let store = PgSessionStore::new(connect().await?);

    if store.remove(&shop).await? {
        tracing::info!("Removed session for {}", shop);
    } else {
        tracing::warn!("No session stored for {}", shop);
    }
    Ok(())
}
