//! Shopify Admin API client for installed shops.
//!
//! # Security
//!
//! Every call is made with a per-shop OAuth access token loaded from the
//! session store. The app's API secret signs OAuth callbacks and webhooks and
//! is never sent anywhere except the token exchange.
//!
//! # Architecture
//!
//! - [`ShopifyClient`] - OAuth token exchange, REST `get_page`/`post`, GraphQL passthrough
//! - [`oauth`] - Authorization URL building, callback HMAC verification, state nonces
//! - [`session_token`] - App Bridge session token verification for the JSON API
//! - [`webhooks`] - Webhook signature verification and topic parsing
//! - [`types`] - REST resource types (price rules, discount codes, webhooks)
//!
//! # Example
//!
//! ```rust,ignore
//! use promo_bridge_server::shopify::ShopifyClient;
//!
//! let client = ShopifyClient::new(&config.shopify);
//!
//! // First page of an installed shop's price rules
//! let page: Page<PriceRulesEnvelope> = client.rest(&session).get_page("price_rules", &[]).await?;
//! ```

mod client;
pub mod oauth;
pub mod session_token;
pub mod types;
pub mod webhooks;

pub use client::{GraphQLResponse, OAuthToken, Page, RestClient, ShopifyClient};
pub use oauth::OAuthStates;
pub use session_token::SessionTokenError;
pub use types::*;
pub use webhooks::{WebhookError, WebhookEvent, WebhookTopic};

use thiserror::Error;

/// Errors that can occur when interacting with the Shopify Admin API.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// The request never produced a response (DNS, connect, TLS, timeout).
    #[error("Shopify unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    /// Response body could not be parsed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The access token was rejected (app uninstalled or token revoked).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Shopify answered with a non-success status.
    #[error("Shopify rejected request ({status}): {body}")]
    Rejected {
        /// HTTP status code returned by Shopify.
        status: u16,
        /// Response body (usually `{"errors": ...}`).
        body: String,
    },

    /// OAuth token exchange failed.
    #[error("OAuth error: {0}")]
    OAuth(String),
}

impl ShopifyError {
    /// Returns true if Shopify reported a validation failure on a code's value.
    ///
    /// Creating a discount code that already exists answers 422 with
    /// `{"errors":{"code":["must be unique"]}}`.
    #[must_use]
    pub fn is_duplicate_code(&self) -> bool {
        match self {
            Self::Rejected { status: 422, body } => body.contains("must be unique"),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shopify_error_display() {
        let err = ShopifyError::NotFound("price_rules/123".to_string());
        assert_eq!(err.to_string(), "Not found: price_rules/123");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = ShopifyError::RateLimited(2);
        assert_eq!(err.to_string(), "Rate limited, retry after 2 seconds");
    }

    #[test]
    fn test_rejected_error() {
        let err = ShopifyError::Rejected {
            status: 422,
            body: r#"{"errors":{"title":["can't be blank"]}}"#.to_string(),
        };
        assert_eq!(
            err.to_string(),
            r#"Shopify rejected request (422): {"errors":{"title":["can't be blank"]}}"#
        );
        assert!(!err.is_duplicate_code());
    }

    #[test]
    fn test_duplicate_code_detection() {
        let err = ShopifyError::Rejected {
            status: 422,
            body: r#"{"errors":{"code":["must be unique. Please try a different code."]}}"#
                .to_string(),
        };
        assert!(err.is_duplicate_code());

        let err = ShopifyError::Unauthorized("revoked".to_string());
        assert!(!err.is_duplicate_code());
    }
}
