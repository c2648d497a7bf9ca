//! Incoming webhook verification.
//!
//! Shopify signs each delivery with `X-Shopify-Hmac-Sha256`: the base64
//! HMAC-SHA256 of the raw request body keyed with the app's API secret.

use std::fmt;

use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use promo_bridge_core::{ShopDomain, ShopDomainError};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const HMAC_HEADER: &str = "x-shopify-hmac-sha256";
pub const TOPIC_HEADER: &str = "x-shopify-topic";
pub const SHOP_DOMAIN_HEADER: &str = "x-shopify-shop-domain";

/// Errors raised while validating a webhook delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// A required Shopify header is absent or not valid UTF-8.
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    /// The body signature does not match.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// The shop domain header is malformed.
    #[error("Invalid shop domain: {0}")]
    InvalidShop(#[from] ShopDomainError),
}

/// Webhook topics this app reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WebhookTopic {
    /// `app/uninstalled`
    AppUninstalled,
    /// Any topic without a handler.
    Other(String),
}

impl WebhookTopic {
    /// Topic name as used in the API and the `X-Shopify-Topic` header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AppUninstalled => "app/uninstalled",
            Self::Other(topic) => topic,
        }
    }
}

impl fmt::Display for WebhookTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for WebhookTopic {
    fn from(s: &str) -> Self {
        match s {
            "app/uninstalled" => Self::AppUninstalled,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A verified webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub topic: WebhookTopic,
    pub shop: ShopDomain,
}

/// Verify a delivery's signature and extract its topic and shop.
///
/// # Errors
///
/// Returns `WebhookError` if a header is missing, the signature does not
/// match the body, or the shop domain is invalid.
pub fn verify(
    headers: &HeaderMap,
    body: &[u8],
    api_secret: &str,
) -> Result<WebhookEvent, WebhookError> {
    let signature = header(headers, HMAC_HEADER)?;
    let signature = BASE64
        .decode(signature)
        .map_err(|_| WebhookError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
        .map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&signature)
        .map_err(|_| WebhookError::InvalidSignature)?;

    let topic = WebhookTopic::from(header(headers, TOPIC_HEADER)?);
    let shop = ShopDomain::parse(header(headers, SHOP_DOMAIN_HEADER)?)?;

    Ok(WebhookEvent { topic, shop })
}

/// Compute the `X-Shopify-Hmac-Sha256` value for `body`.
#[must_use]
pub fn sign(body: &[u8], api_secret: &str) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(api_secret.as_bytes()) else {
        return String::new();
    };
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingHeader(name))
}
