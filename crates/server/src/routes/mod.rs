//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (session backend reachable)
//!
//! # OAuth
//! GET  /auth?shop=             - Start installation, redirect to Shopify
//! GET  /auth/callback          - Verify callback, store session, register uninstall webhook
//!
//! # API (JSON; `Authorization: Bearer <session token>` naming an installed shop)
//! POST /webhooks               - Signed Shopify webhook deliveries (no session)
//! POST /graphql                - Admin GraphQL passthrough
//! GET  /pricerule              - List price rules
//! POST /pricerule/new          - Create a price rule
//! POST /discount/new           - Issue a discount code under a price rule
//!
//! # Rendering server
//! GET  /_next/static/{*path}   - Front-end assets (no session)
//! GET  /_next/webpack-hmr      - Dev hot reload (no session)
//! GET  /*                      - Pages (session required, otherwise redirect to /auth)
//! ```

pub mod auth;
pub mod discounts;
pub mod graphql;
pub mod price_rules;
pub mod render;
pub mod webhooks;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::de::DeserializeOwned;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::error::AppError;
use crate::session::Sessions;
use crate::state::AppState;

/// Build the route table.
pub fn routes() -> Router<AppState> {
    Router::new()
        // OAuth
        .route("/auth", get(auth::begin))
        .route("/auth/callback", get(auth::callback))
        // API
        .route("/webhooks", post(webhooks::receive))
        .route("/graphql", post(graphql::proxy))
        .route("/pricerule", get(price_rules::list))
        .route("/pricerule/new", post(price_rules::create))
        .route("/discount/new", post(discounts::create))
        // Rendering server
        .route("/_next/static/{*path}", get(render::asset))
        .route("/_next/webpack-hmr", get(render::asset))
        .fallback(get(render::page))
}

/// Full application: routes, health checks and request tracing.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri().path(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                        span.record("latency_ms", latency_ms);
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// With the Postgres session backend, verifies database connectivity.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.sessions() {
        Sessions::Memory(_) => StatusCode::OK,
        Sessions::Postgres(store) => {
            match sqlx::query("SELECT 1").fetch_one(store.pool()).await {
                Ok(_) => StatusCode::OK,
                Err(e) => {
                    tracing::warn!(error = %e, "Readiness check failed");
                    StatusCode::SERVICE_UNAVAILABLE
                }
            }
        }
    }
}

/// Parse an optional JSON request body; an empty body yields `T::default()`.
pub(crate) fn optional_json<T>(body: &Bytes) -> Result<T, AppError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, header};
    use chrono::Utc;
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use secrecy::ExposeSecret;
    use serde::Deserialize;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppConfig;

    fn test_app() -> Router {
        let state = AppState::new(AppConfig::for_tests(), Sessions::default()).unwrap();
        app(state)
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_and_readiness() {
        let response = test_app()
            .oneshot(request(Method::GET, "/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = test_app()
            .oneshot(request(Method::GET, "/health/ready"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_page_without_session_redirects() {
        let response = test_app()
            .oneshot(request(Method::GET, "/dashboard?shop=demo.myshopify.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/auth?shop=demo.myshopify.com"
        );
    }

    #[tokio::test]
    async fn test_api_without_session_is_unauthorized() {
        for (method, uri) in [
            (Method::GET, "/pricerule?shop=demo.myshopify.com"),
            (Method::POST, "/pricerule/new?shop=demo.myshopify.com"),
            (Method::POST, "/discount/new?shop=demo.myshopify.com"),
            (Method::POST, "/graphql"),
        ] {
            let response = test_app().oneshot(request(method, uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    fn session_token(shop: &str, secret: &str) -> String {
        let config = AppConfig::for_tests();
        let now = Utc::now().timestamp();
        let claims = json!({
            "iss": format!("https://{shop}/admin"),
            "dest": format!("https://{shop}"),
            "aud": config.shopify.api_key,
            "sub": "42",
            "exp": now + 60,
            "nbf": now - 1,
        });
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn with_bearer(mut request: Request<Body>, token: &str) -> Request<Body> {
        request.headers_mut().insert(
            header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        request
    }

    async fn error_code(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        body["error"]["code"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_api_ignores_shop_named_by_query_or_header() {
        let mut request = request(Method::POST, "/graphql?shop=demo.myshopify.com");
        request
            .headers_mut()
            .insert("x-shopify-shop-domain", "demo.myshopify.com".parse().unwrap());

        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()["x-shopify-api-request-failure-reauthorize-url"],
            "/auth"
        );
    }

    #[tokio::test]
    async fn test_api_with_token_for_unknown_shop_requires_session() {
        let config = AppConfig::for_tests();
        let token = session_token(
            "demo.myshopify.com",
            config.shopify.api_secret.expose_secret(),
        );
        let request = with_bearer(request(Method::GET, "/pricerule"), &token);

        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()["x-shopify-api-request-failure-reauthorize-url"],
            "/auth?shop=demo.myshopify.com"
        );
        assert_eq!(error_code(response).await, "session_required");
    }

    #[tokio::test]
    async fn test_api_with_forged_token_is_unauthorized() {
        let token = session_token("demo.myshopify.com", "not-the-app-secret");
        let request = with_bearer(request(Method::POST, "/discount/new"), &token);

        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()["x-shopify-retry-invalid-session-request"],
            "1"
        );
        assert_eq!(error_code(response).await, "invalid_session_token");
    }

    #[tokio::test]
    async fn test_unsigned_webhook_is_unauthorized() {
        let response = test_app()
            .oneshot(request(Method::POST, "/webhooks"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_catch_all_only_serves_get() {
        let response = test_app()
            .oneshot(request(Method::DELETE, "/dashboard"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[derive(Debug, Default, Deserialize, PartialEq, Eq)]
    struct TitleBody {
        title: Option<String>,
    }

    #[test]
    fn test_optional_json_empty_is_default() {
        assert_eq!(
            optional_json::<TitleBody>(&Bytes::new()).unwrap(),
            TitleBody::default()
        );
        assert_eq!(
            optional_json::<TitleBody>(&Bytes::from_static(b" \n")).unwrap(),
            TitleBody::default()
        );
    }

    #[test]
    fn test_optional_json_parses() {
        let body =
            optional_json::<TitleBody>(&Bytes::from_static(br#"{"title":"SPRING"}"#)).unwrap();
        assert_eq!(body.title.as_deref(), Some("SPRING"));
    }

    #[test]
    fn test_optional_json_malformed() {
        let result = optional_json::<TitleBody>(&Bytes::from_static(b"{not json"));
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
