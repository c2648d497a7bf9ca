//! App Bridge session tokens.
//!
//! The embedded front end calls the JSON API with
//! `Authorization: Bearer <token>`. Shopify mints the token as an HS256 JWT
//! signed with the app's API secret; `aud` is the API key and `dest` is the
//! origin of the shop the merchant is signed in to.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use promo_bridge_core::ShopDomain;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Clock skew tolerated on `exp` and `nbf`, in seconds.
const LEEWAY_SECS: u64 = 5;

/// Claims of a session token.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionTokenClaims {
    /// Shop admin URL, e.g. `https://demo.myshopify.com/admin`.
    pub iss: String,
    /// Shop origin, e.g. `https://demo.myshopify.com`.
    pub dest: String,
    /// API key of the app the token was minted for.
    pub aud: String,
    /// Staff member the token was minted for.
    #[serde(default)]
    pub sub: Option<String>,
    pub exp: i64,
    pub nbf: i64,
}

/// Why a session token was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionTokenError {
    #[error("session token has expired")]
    Expired,
    #[error("session token is not valid yet")]
    NotYetValid,
    #[error("session token was minted for another app")]
    WrongAudience,
    #[error("session token does not name a shop: {0}")]
    InvalidDestination(String),
    #[error("session token issuer does not match its shop")]
    IssuerMismatch,
    #[error("session token is malformed or its signature is wrong")]
    Invalid,
}

/// Verify `token` and return the shop it was minted for.
///
/// # Errors
///
/// Returns `SessionTokenError` for a bad signature, an expired or premature
/// token, another app's token or one whose `dest`/`iss` do not name the same
/// `*.myshopify.com` shop.
pub fn verify(
    token: &str,
    api_key: &str,
    api_secret: &str,
) -> Result<ShopDomain, SessionTokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[api_key]);
    validation.set_required_spec_claims(&["exp", "nbf", "aud"]);
    validation.validate_nbf = true;
    validation.leeway = LEEWAY_SECS;

    let claims = jsonwebtoken::decode::<SessionTokenClaims>(
        token,
        &DecodingKey::from_secret(api_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => SessionTokenError::Expired,
        ErrorKind::ImmatureSignature => SessionTokenError::NotYetValid,
        ErrorKind::InvalidAudience => SessionTokenError::WrongAudience,
        _ => {
            tracing::debug!(error = %e, "Session token rejected");
            SessionTokenError::Invalid
        }
    })?
    .claims;

    let shop = shop_from_url(&claims.dest)?;
    if shop_from_url(&claims.iss).ok().as_ref() != Some(&shop) {
        return Err(SessionTokenError::IssuerMismatch);
    }
    Ok(shop)
}

/// The shop whose `https` origin is `raw`.
fn shop_from_url(raw: &str) -> Result<ShopDomain, SessionTokenError> {
    let invalid = || SessionTokenError::InvalidDestination(raw.to_string());

    let url = Url::parse(raw).map_err(|_| invalid())?;
    if url.scheme() != "https" {
        return Err(invalid());
    }
    let host = url.host_str().ok_or_else(invalid)?;
    ShopDomain::parse(host).map_err(|_| invalid())
}
