//! Shop session extractor.
//!
//! JSON API calls name their shop only through a verified App Bridge session
//! token (`Authorization: Bearer ...`). Page requests name it with the `shop`
//! query parameter, or the `X-Shopify-Shop-Domain` header when the query has
//! none; a page only decides between rendering and `/auth`.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use promo_bridge_core::ShopDomain;

use crate::error::{AppError, reauthorize_path};
use crate::session::{SessionStore, SessionStoreError, ShopSession};
use crate::shopify::session_token::{self, SessionTokenError};
use crate::shopify::webhooks::SHOP_DOMAIN_HEADER;
use crate::state::AppState;

/// Paths answered with JSON rather than pages.
const API_PATHS: &[&str] = &[
    "/webhooks",
    "/graphql",
    "/pricerule",
    "/pricerule/new",
    "/discount/new",
];

/// Returns true for JSON API routes.
#[must_use]
pub fn is_api_path(path: &str) -> bool {
    API_PATHS.contains(&path.trim_end_matches('/'))
}

/// Extractor that requires a stored session for the requesting shop.
///
/// Page requests without one are redirected to `/auth`. API requests without
/// a session token, or whose shop has no session, get a 401 carrying the
/// reauthorize headers; a token that fails verification gets a plain 401.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireShopSession(session): RequireShopSession) -> impl IntoResponse {
///     format!("Hello, {}!", session.shop)
/// }
/// ```
pub struct RequireShopSession(pub ShopSession);

/// Error returned when the shop has no usable session.
#[derive(Debug)]
pub enum ShopSessionRejection {
    /// Redirect to `/auth` (page requests).
    RedirectToAuth(Option<ShopDomain>),
    /// 401 with reauthorize headers (API requests).
    Reauthorize(Option<ShopDomain>),
    /// The session token failed verification (API requests).
    InvalidToken(SessionTokenError),
    /// The session backend failed.
    Store(SessionStoreError),
}

impl IntoResponse for ShopSessionRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToAuth(shop) => {
                Redirect::to(&reauthorize_path(shop.as_ref())).into_response()
            }
            Self::Reauthorize(shop) => AppError::SessionRequired(shop).into_response(),
            Self::InvalidToken(e) => AppError::SessionToken(e).into_response(),
            Self::Store(e) => AppError::SessionStore(e).into_response(),
        }
    }
}

impl FromRequestParts<AppState> for RequireShopSession {
    type Rejection = ShopSessionRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let is_api = is_api_path(parts.uri.path());
        let reject = |shop: Option<ShopDomain>| {
            if is_api {
                ShopSessionRejection::Reauthorize(shop)
            } else {
                ShopSessionRejection::RedirectToAuth(shop)
            }
        };

        let shop = if is_api {
            let Some(token) = bearer_token(parts) else {
                return Err(reject(None));
            };
            let shopify = state.shopify();
            session_token::verify(token, shopify.api_key(), shopify.api_secret())
                .map_err(ShopSessionRejection::InvalidToken)?
        } else {
            let Some(shop) = requesting_shop(parts) else {
                return Err(reject(None));
            };
            shop
        };

        match state.sessions().get(&shop).await {
            Ok(Some(session)) => Ok(Self(session)),
            Ok(None) => {
                tracing::debug!(%shop, "No session for shop");
                Err(reject(Some(shop)))
            }
            Err(e) => Err(ShopSessionRejection::Store(e)),
        }
    }
}

/// The token of an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The shop a page request names, if it names a valid one.
fn requesting_shop(parts: &Parts) -> Option<ShopDomain> {
    let from_query = parts.uri.query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "shop")
            .map(|(_, value)| value.into_owned())
    });

    let raw = from_query.or_else(|| {
        parts
            .headers
            .get(SHOP_DOMAIN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    })?;

    ShopDomain::parse(&raw).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Request, StatusCode, header};

    use super::*;

    fn parts(uri: &str) -> Parts {
        Request::builder().uri(uri).body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_is_api_path() {
        assert!(is_api_path("/graphql"));
        assert!(is_api_path("/pricerule/new"));
        assert!(is_api_path("/discount/new/"));
        assert!(!is_api_path("/"));
        assert!(!is_api_path("/settings"));
    }

    #[test]
    fn test_requesting_shop_from_query() {
        let shop = requesting_shop(&parts("/?shop=demo.myshopify.com&host=abc")).unwrap();
        assert_eq!(shop.as_str(), "demo.myshopify.com");
    }

    #[test]
    fn test_requesting_shop_from_header() {
        let mut parts = parts("/graphql");
        parts
            .headers
            .insert(SHOP_DOMAIN_HEADER, "demo.myshopify.com".parse().unwrap());
        assert_eq!(
            requesting_shop(&parts).unwrap().as_str(),
            "demo.myshopify.com"
        );
    }

    #[test]
    fn test_requesting_shop_missing_or_invalid() {
        assert!(requesting_shop(&parts("/")).is_none());
        assert!(requesting_shop(&parts("/?shop=evil.example.com")).is_none());
    }

    #[test]
    fn test_bearer_token() {
        let mut parts = parts("/graphql");
        assert!(bearer_token(&parts).is_none());

        parts
            .headers
            .insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&parts), Some("abc.def.ghi"));

        parts
            .headers
            .insert(header::AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());
        assert!(bearer_token(&parts).is_none());

        parts
            .headers
            .insert(header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert!(bearer_token(&parts).is_none());
    }

    #[test]
    fn test_invalid_token_rejection() {
        let response =
            ShopSessionRejection::InvalidToken(SessionTokenError::Expired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()["x-shopify-retry-invalid-session-request"],
            "1"
        );
    }

    #[test]
    fn test_redirect_rejection() {
        let shop = ShopDomain::parse("demo.myshopify.com").unwrap();
        let response = ShopSessionRejection::RedirectToAuth(Some(shop)).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/auth?shop=demo.myshopify.com"
        );

        let response = ShopSessionRejection::RedirectToAuth(None).into_response();
        assert_eq!(response.headers()[header::LOCATION], "/auth");
    }

    #[test]
    fn test_reauthorize_rejection() {
        let response = ShopSessionRejection::Reauthorize(None).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()["x-shopify-api-request-failure-reauthorize"],
            "1"
        );
    }
}
