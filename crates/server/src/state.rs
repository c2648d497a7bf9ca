//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::render::{RenderError, RenderProxy};
use crate::services::DiscountCodeGenerator;
use crate::session::Sessions;
use crate::shopify::{OAuthStates, ShopifyClient};

/// Application state shared across all handlers.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    sessions: Sessions,
    shopify: ShopifyClient,
    oauth_states: OAuthStates,
    render: RenderProxy,
    codes: DiscountCodeGenerator,
}

impl AppState {
    /// Build the state from configuration and the chosen session backend.
    ///
    /// # Errors
    ///
    /// Returns `RenderError` if the rendering proxy's HTTP client cannot be built.
    pub fn new(config: AppConfig, sessions: Sessions) -> Result<Self, RenderError> {
        let shopify = ShopifyClient::new(&config.shopify);
        let render = RenderProxy::new(&config.render_origin)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                sessions,
                shopify,
                oauth_states: OAuthStates::new(),
                render,
                codes: DiscountCodeGenerator::new(),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn sessions(&self) -> &Sessions {
        &self.inner.sessions
    }

    #[must_use]
    pub fn shopify(&self) -> &ShopifyClient {
        &self.inner.shopify
    }

    /// Outstanding OAuth `state` nonces.
    #[must_use]
    pub fn oauth_states(&self) -> &OAuthStates {
        &self.inner.oauth_states
    }

    #[must_use]
    pub fn render(&self) -> &RenderProxy {
        &self.inner.render
    }

    #[must_use]
    pub fn codes(&self) -> DiscountCodeGenerator {
        self.inner.codes
    }
}
