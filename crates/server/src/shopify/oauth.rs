//! Shopify OAuth helpers.
//!
//! Authorization URL building, callback HMAC verification and the short-lived
//! `state` nonces that tie a callback to the `/auth` request that started it.

use std::time::Duration;

use hmac::{Hmac, Mac};
use moka::future::Cache;
use promo_bridge_core::{AccessScopes, ShopDomain};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// How long an issued `state` nonce stays valid.
const STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Upper bound on outstanding nonces (one per in-flight install).
const STATE_CAPACITY: u64 = 10_000;

/// Build the URL that starts the OAuth grant for `shop`.
///
/// `origin` is normally `https://{shop}`; see [`super::ShopifyClient::admin_origin`].
#[must_use]
pub fn authorization_url(
    origin: &str,
    client_id: &str,
    scopes: &AccessScopes,
    redirect_uri: &str,
    state: &str,
) -> String {
    format!(
        "{}/admin/oauth/authorize?client_id={}&scope={}&redirect_uri={}&state={}",
        origin,
        urlencoding::encode(client_id),
        urlencoding::encode(&scopes.to_string()),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(state)
    )
}

/// Verify the HMAC signature Shopify attaches to the OAuth callback.
///
/// Shopify signs every query parameter except `hmac` (and the legacy
/// `signature`), sorted by key and joined as `k=v&k=v`, using the app's API
/// secret. `raw_query` is the undecoded query string of the callback request.
#[must_use]
pub fn verify_callback_hmac(raw_query: &str, api_secret: &str) -> bool {
    let mut provided = None;
    let mut pairs: Vec<(String, String)> = Vec::new();

    for (key, value) in url::form_urlencoded::parse(raw_query.as_bytes()) {
        match key.as_ref() {
            "hmac" => provided = Some(value.into_owned()),
            "signature" => {}
            _ => pairs.push((key.into_owned(), value.into_owned())),
        }
    }

    let Some(provided) = provided else {
        return false;
    };
    let Ok(provided) = hex::decode(provided) else {
        return false;
    };

    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let message = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let Ok(mut mac) = HmacSha256::new_from_slice(api_secret.as_bytes()) else {
        return false;
    };
    mac.update(message.as_bytes());

    // Constant-time comparison
    mac.verify_slice(&provided).is_ok()
}

/// Sign a callback query the way Shopify does. Used by tests and local tooling.
#[must_use]
pub fn sign_callback_query(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let message = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let Ok(mut mac) = HmacSha256::new_from_slice(api_secret.as_bytes()) else {
        return String::new();
    };
    mac.update(message.as_bytes());
    let hmac = hex::encode(mac.finalize().into_bytes());

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in params {
        serializer.append_pair(k, v);
    }
    serializer.append_pair("hmac", &hmac);
    serializer.finish()
}

/// Outstanding OAuth `state` nonces, keyed by nonce.
///
/// Each nonce is bound to the shop that requested it and can be consumed once.
#[derive(Clone)]
pub struct OAuthStates {
    cache: Cache<String, ShopDomain>,
}

impl Default for OAuthStates {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuthStates {
    /// Create an empty nonce cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(STATE_CAPACITY)
                .time_to_live(STATE_TTL)
                .build(),
        }
    }

    /// Mint a nonce for `shop`.
    pub async fn issue(&self, shop: &ShopDomain) -> String {
        let nonce = uuid::Uuid::new_v4().to_string();
        self.cache.insert(nonce.clone(), shop.clone()).await;
        nonce
    }

    /// Consume a nonce. Returns true only if it was issued for `shop` and has
    /// not been used or expired.
    pub async fn consume(&self, nonce: &str, shop: &ShopDomain) -> bool {
        self.cache
            .remove(nonce)
            .await
            .is_some_and(|issued_for| &issued_for == shop)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "hush";

    #[test]
    fn test_verify_callback_hmac_valid() {
        // Example from Shopify's OAuth documentation
        let query = "code=0907a61c0c8d55e99db179b68161bc00&hmac=700e2dadb827fcc8609e9d5ce208b2e9cdaab9df07390d2cbca10d7c328fc4bf&shop=some-shop.myshopify.com&state=0.6784241404160823&timestamp=1337178173";
        assert!(verify_callback_hmac(query, SECRET));
    }

    #[test]
    fn test_verify_callback_hmac_order_independent() {
        let query = "timestamp=1337178173&state=0.6784241404160823&shop=some-shop.myshopify.com&hmac=700e2dadb827fcc8609e9d5ce208b2e9cdaab9df07390d2cbca10d7c328fc4bf&code=0907a61c0c8d55e99db179b68161bc00";
        assert!(verify_callback_hmac(query, SECRET));
    }

    #[test]
    fn test_verify_callback_hmac_tampered() {
        let query = "code=0907a61c0c8d55e99db179b68161bc00&hmac=700e2dadb827fcc8609e9d5ce208b2e9cdaab9df07390d2cbca10d7c328fc4bf&shop=other-shop.myshopify.com&state=0.6784241404160823&timestamp=1337178173";
        assert!(!verify_callback_hmac(query, SECRET));
    }

    #[test]
    fn test_verify_callback_hmac_missing_or_garbage() {
        assert!(!verify_callback_hmac("code=abc&shop=a.myshopify.com", SECRET));
        assert!(!verify_callback_hmac("code=abc&hmac=not-hex", SECRET));
    }

    #[test]
    fn test_sign_then_verify() {
        let query = sign_callback_query(
            &[
                ("code", "abc"),
                ("host", "YWRtaW4uc2hvcGlmeS5jb20vc3RvcmUvZGVtbw"),
                ("shop", "demo.myshopify.com"),
                ("state", "nonce"),
                ("timestamp", "1700000000"),
            ],
            SECRET,
        );
        assert!(verify_callback_hmac(&query, SECRET));
        assert!(!verify_callback_hmac(&query, "other-secret"));
    }

    #[test]
    fn test_authorization_url() {
        let url = authorization_url(
            "https://demo.myshopify.com",
            "api-key",
            &AccessScopes::parse("write_price_rules,write_discounts"),
            "https://app.example.com/auth/callback",
            "nonce-1",
        );
        assert_eq!(
            url,
            "https://demo.myshopify.com/admin/oauth/authorize?client_id=api-key&scope=write_discounts%2Cwrite_price_rules&redirect_uri=https%3A%2F%2Fapp.example.com%2Fauth%2Fcallback&state=nonce-1"
        );
    }

    #[tokio::test]
    async fn test_state_nonce_single_use() {
        let states = OAuthStates::new();
        let shop = ShopDomain::parse("demo.myshopify.com").unwrap();
        let nonce = states.issue(&shop).await;

        assert!(states.consume(&nonce, &shop).await);
        assert!(!states.consume(&nonce, &shop).await);
    }

    #[tokio::test]
    async fn test_state_nonce_bound_to_shop() {
        let states = OAuthStates::new();
        let shop = ShopDomain::parse("demo.myshopify.com").unwrap();
        let other = ShopDomain::parse("other.myshopify.com").unwrap();
        let nonce = states.issue(&shop).await;

        assert!(!states.consume(&nonce, &other).await);
        assert!(!states.consume("unknown", &shop).await);
    }
}
