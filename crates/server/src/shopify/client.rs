//! Shopify Admin API HTTP client with OAuth authentication.
//!
//! One [`ShopifyClient`] is shared by every request; per-shop calls go through
//! a [`RestClient`] borrowed for a single [`ShopSession`].

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use promo_bridge_core::{AccessScopes, ShopDomain};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::instrument;

use crate::config::ShopifyAppConfig;
use crate::session::ShopSession;

use super::{ShopifyError, oauth};

/// Header carrying the per-shop access token.
const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Fallback when a 429 response has no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 2;

/// OAuth token obtained from the code exchange.
#[derive(Clone)]
pub struct OAuthToken {
    /// Shop the token was issued for.
    pub shop: ShopDomain,
    /// Offline access token.
    pub access_token: SecretString,
    /// Scopes actually granted by the merchant.
    pub scope: AccessScopes,
    /// When the token was obtained.
    pub obtained_at: DateTime<Utc>,
}

impl std::fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthToken")
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

/// OAuth token response from Shopify.
#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    scope: String,
}

/// Relayed GraphQL response: upstream status and JSON body.
#[derive(Debug, Clone)]
pub struct GraphQLResponse {
    pub status: StatusCode,
    pub body: serde_json::Value,
}

/// Shopify Admin API client.
///
/// Cheap to clone; the underlying `reqwest::Client` (and its connection pool)
/// is shared.
#[derive(Clone)]
pub struct ShopifyClient {
    inner: Arc<ShopifyClientInner>,
}

struct ShopifyClientInner {
    client: reqwest::Client,
    api_key: String,
    api_secret: SecretString,
    api_version: String,
    scopes: AccessScopes,
    /// Replaces `https://{shop}` for every outbound call when set.
    admin_origin: Option<String>,
}

impl ShopifyClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `config` - Shopify app credentials and API version
    #[must_use]
    pub fn new(config: &ShopifyAppConfig) -> Self {
        Self {
            inner: Arc::new(ShopifyClientInner {
                client: reqwest::Client::new(),
                api_key: config.api_key.clone(),
                api_secret: config.api_secret.clone(),
                api_version: config.api_version.clone(),
                scopes: config.scopes.clone(),
                admin_origin: config
                    .admin_origin
                    .as_ref()
                    .map(|url| url.as_str().trim_end_matches('/').to_string()),
            }),
        }
    }

    /// Get the API key (OAuth client ID).
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.inner.api_key
    }

    /// Get the API secret (for HMAC verification).
    #[must_use]
    pub fn api_secret(&self) -> &str {
        self.inner.api_secret.expose_secret()
    }

    /// Scopes requested during installation.
    #[must_use]
    pub fn scopes(&self) -> &AccessScopes {
        &self.inner.scopes
    }

    /// Origin serving `shop`'s admin endpoints.
    #[must_use]
    pub fn admin_origin(&self, shop: &ShopDomain) -> String {
        self.inner
            .admin_origin
            .clone()
            .unwrap_or_else(|| format!("https://{shop}"))
    }

    // =========================================================================
    // OAuth Flow
    // =========================================================================

    /// Generate the OAuth authorization URL for `shop`.
    #[must_use]
    pub fn authorization_url(&self, shop: &ShopDomain, redirect_uri: &str, state: &str) -> String {
        oauth::authorization_url(
            &self.admin_origin(shop),
            &self.inner.api_key,
            &self.inner.scopes,
            redirect_uri,
            state,
        )
    }

    /// Exchange an authorization code for an offline access token.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::OAuth` if Shopify refuses the exchange.
    /// Returns `ShopifyError::Unreachable` if the HTTP request fails.
    #[instrument(skip(self, code), fields(shop = %shop))]
    pub async fn exchange_code(
        &self,
        shop: &ShopDomain,
        code: &str,
    ) -> Result<OAuthToken, ShopifyError> {
        let url = format!("{}/admin/oauth/access_token", self.admin_origin(shop));

        let params = serde_json::json!({
            "client_id": self.inner.api_key,
            "client_secret": self.inner.api_secret.expose_secret(),
            "code": code,
        });

        let response = self.inner.client.post(&url).json(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ShopifyError::OAuth(format!(
                "Token exchange failed ({status}): {text}"
            )));
        }

        let token_response: OAuthTokenResponse =
            serde_json::from_slice(&response.bytes().await?)?;

        Ok(OAuthToken {
            shop: shop.clone(),
            access_token: SecretString::from(token_response.access_token),
            scope: AccessScopes::parse(&token_response.scope),
            obtained_at: Utc::now(),
        })
    }

    // =========================================================================
    // Per-shop access
    // =========================================================================

    /// REST client bound to `session`'s shop and access token.
    #[must_use]
    pub fn rest<'a>(&'a self, session: &'a ShopSession) -> RestClient<'a> {
        RestClient {
            client: self,
            session,
        }
    }

    /// Forward a raw GraphQL request body to the shop's Admin GraphQL endpoint.
    ///
    /// The upstream status and JSON body are returned as-is, including
    /// GraphQL-level `errors`; only transport and auth failures are errors.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::Unreachable`, `Unauthorized` or `RateLimited`.
    #[instrument(skip(self, session, body), fields(shop = %session.shop))]
    pub async fn graphql(
        &self,
        session: &ShopSession,
        body: &serde_json::Value,
    ) -> Result<GraphQLResponse, ShopifyError> {
        let url = format!(
            "{}/admin/api/{}/graphql.json",
            self.admin_origin(&session.shop),
            self.inner.api_version
        );

        let response = self
            .inner
            .client
            .post(&url)
            .header(ACCESS_TOKEN_HEADER, session.access_token.expose_secret())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        check_auth_and_rate_limit(&response)?;

        let bytes = response.bytes().await?;
        let body = serde_json::from_slice(&bytes)?;

        Ok(GraphQLResponse {
            status,
            body,
        })
    }

    fn resource_url(&self, shop: &ShopDomain, path: &str) -> String {
        format!(
            "{}/admin/api/{}/{}.json",
            self.admin_origin(shop),
            self.inner.api_version,
            path.trim_matches('/')
        )
    }
}

/// One page of a cursor-paginated REST listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub body: T,
    /// `page_info` cursor of the next page; `None` on the last page.
    pub next_page_info: Option<String>,
}

/// REST Admin API verbs for one shop.
#[derive(Clone, Copy)]
pub struct RestClient<'a> {
    client: &'a ShopifyClient,
    session: &'a ShopSession,
}

impl RestClient<'_> {
    /// `GET /admin/api/{version}/{path}.json?{query}`, one page of a listing.
    ///
    /// The cursor for the following page is read from the `Link` header.
    ///
    /// # Errors
    ///
    /// Returns a `ShopifyError` describing the transport or status failure.
    #[instrument(skip(self), fields(shop = %self.session.shop))]
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Page<T>, ShopifyError> {
        let mut url = self.client.resource_url(&self.session.shop, path);
        if !query.is_empty() {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            serializer.extend_pairs(query);
            url.push('?');
            url.push_str(&serializer.finish());
        }
        let response = self
            .client
            .inner
            .client
            .get(&url)
            .header(ACCESS_TOKEN_HEADER, self.session.access_token.expose_secret())
            .send()
            .await?;

        let next_page_info = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_page_info);
        let body = read_json(response, path).await?;

        Ok(Page {
            body,
            next_page_info,
        })
    }

    /// `POST /admin/api/{version}/{path}.json` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns a `ShopifyError` describing the transport or status failure.
    #[instrument(skip(self, body), fields(shop = %self.session.shop))]
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ShopifyError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.client.resource_url(&self.session.shop, path);
        let response = self
            .client
            .inner
            .client
            .post(&url)
            .header(ACCESS_TOKEN_HEADER, self.session.access_token.expose_secret())
            .json(body)
            .send()
            .await?;

        read_json(response, path).await
    }
}

fn check_auth_and_rate_limit(response: &reqwest::Response) -> Result<(), ShopifyError> {
    match response.status() {
        reqwest::StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<f64>().ok())
                .map_or(DEFAULT_RETRY_AFTER_SECS, |secs| {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let secs = secs.ceil().max(0.0) as u64;
                    secs
                });
            Err(ShopifyError::RateLimited(retry_after))
        }
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => Err(
            ShopifyError::Unauthorized("Invalid or expired access token".to_string()),
        ),
        _ => Ok(()),
    }
}

async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    path: &str,
) -> Result<T, ShopifyError> {
    check_auth_and_rate_limit(&response)?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ShopifyError::NotFound(path.to_string()));
    }

    let bytes = response.bytes().await?;
    if !status.is_success() {
        return Err(ShopifyError::Rejected {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    Ok(serde_json::from_slice(&bytes)?)
}

/// The `page_info` of the `rel="next"` entry of a `Link` header.
///
/// `<https://shop/admin/api/2024-10/price_rules.json?limit=250&page_info=abc>; rel="next"`
fn next_page_info(link: &str) -> Option<String> {
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|param| param.trim().replace(' ', "") == r#"rel="next""#);
        if !is_next {
            return None;
        }

        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        let url = url::Url::parse(target).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "page_info")
            .map(|(_, value)| value.into_owned())
    })
}
