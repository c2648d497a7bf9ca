//! Integration test harness for Promo Bridge.
//!
//! [`TestApp::spawn`] starts the real router on an ephemeral port, pointed at a
//! [`MockUpstream`] that answers for both the Shopify Admin API and the
//! rendering server. Sessions are kept in memory so tests can inspect them.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p promo-bridge-integration-tests
//! ```
//!
//! No database or network access is needed.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use promo_bridge_core::{AccessScopes, ShopDomain};
use promo_bridge_server::config::{AppConfig, ShopifyAppConfig};
use promo_bridge_server::routes;
use promo_bridge_server::session::{MemorySessionStore, SessionStore, Sessions, ShopSession};
use promo_bridge_server::shopify::oauth::sign_callback_query;
use promo_bridge_server::shopify::webhooks::{
    HMAC_HEADER, SHOP_DOMAIN_HEADER, TOPIC_HEADER, sign,
};
use promo_bridge_server::state::AppState;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

pub const API_KEY: &str = "integration-api-key";
pub const API_SECRET: &str = "kX9#mQ2$vL7@pR4!wZ8^";
pub const API_VERSION: &str = "2024-10";
pub const SCOPES: &str = "write_discounts,write_price_rules";
pub const ACCESS_TOKEN: &str = "shpat_integration_token";
pub const PUBLIC_URL: &str = "https://promo.example.com";
pub const PLACEHOLDER_TITLE: &str = "REWARD_DISCOUNT";

pub const DEMO_SHOP: &str = "demo.myshopify.com";
pub const DEMO_HOST: &str = "YWRtaW4uc2hvcGlmeS5jb20vc3RvcmUvZGVtbw==";

/// Largest page the mock serves, whatever `limit` asks for.
pub const MOCK_PAGE_LIMIT: usize = 250;

/// Authorization code the mock refuses to exchange.
pub const REJECTED_CODE: &str = "rejected-code";

// =============================================================================
// Mock upstream
// =============================================================================

/// A request the mock received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub access_token: Option<String>,
    pub body: Value,
}

/// Everything the mock Shopify store holds.
#[derive(Debug, Default)]
pub struct MockData {
    pub requests: Vec<RecordedRequest>,
    pub price_rules: Vec<Value>,
    pub discount_codes: Vec<Value>,
    pub webhooks: Vec<Value>,
    /// Answer webhook registration with 422.
    pub fail_webhook_registration: bool,
    last_id: i64,
}

impl MockData {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        1000 + self.last_id
    }
}

/// Fake Shopify Admin API plus rendering server on one port.
///
/// `/admin/...` paths behave like a tiny Shopify store; every other path
/// answers `200 rendered <path>` with an `x-rendered-by: mock` header.
#[derive(Clone)]
pub struct MockUpstream {
    pub url: Url,
    data: Arc<Mutex<MockData>>,
}

impl MockUpstream {
    pub async fn spawn() -> Self {
        let data = Arc::new(Mutex::new(MockData::default()));
        let router = Router::new().fallback(handle).with_state(data.clone());
        let addr = serve(router).await;
        let url = Url::parse(&format!("http://{addr}")).expect("mock url");
        Self { url, data }
    }

    /// Lock the mock's state.
    pub fn data(&self) -> MutexGuard<'_, MockData> {
        self.data.lock().expect("mock state poisoned")
    }

    /// Requests received for `method` on a path ending with `suffix`.
    pub fn requests_to(&self, method: &Method, suffix: &str) -> Vec<RecordedRequest> {
        self.data()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path.ends_with(suffix))
            .cloned()
            .collect()
    }

    /// Store a price rule directly and return its id.
    pub fn add_price_rule(&self, title: &str) -> i64 {
        let mut data = self.data();
        let id = data.next_id();
        data.price_rules.push(json!({
            "id": id,
            "title": title,
            "target_type": "line_item",
            "target_selection": "all",
            "allocation_method": "across",
            "value_type": "percentage",
            "value": "-15.0",
            "customer_selection": "all",
            "starts_at": "2024-01-01T00:00:00-05:00",
            "ends_at": null,
            "once_per_customer": false,
        }));
        id
    }
}

async fn handle(
    State(data): State<Arc<Mutex<MockData>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let access_token = headers
        .get("x-shopify-access-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut data = data.lock().expect("mock state poisoned");
    data.requests.push(RecordedRequest {
        method: method.clone(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        access_token: access_token.clone(),
        body: body.clone(),
    });

    if uri.path() == "/admin/oauth/access_token" {
        return exchange_token(&body);
    }

    let api_prefix = format!("/admin/api/{API_VERSION}/");
    let Some(resource) = uri.path().strip_prefix(api_prefix.as_str()) else {
        let rendered = uri.path_and_query().map_or("/", |pq| pq.as_str());
        return (
            StatusCode::OK,
            [("x-rendered-by", "mock")],
            format!("rendered {rendered}"),
        )
            .into_response();
    };

    if access_token.as_deref() != Some(ACCESS_TOKEN) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"errors": "[API] Invalid API key or access token"})),
        )
            .into_response();
    }

    match (&method, resource) {
        (&Method::GET, "price_rules.json") => list_price_rules(&data, &uri, &headers),
        (&Method::POST, "price_rules.json") => {
            let Some(mut rule) = body.get("price_rule").cloned() else {
                return unprocessable(json!({"price_rule": "Required parameter missing"}));
            };
            rule["id"] = json!(data.next_id());
            data.price_rules.push(rule.clone());
            (StatusCode::CREATED, Json(json!({"price_rule": rule}))).into_response()
        }
        (&Method::POST, "webhooks.json") => {
            if data.fail_webhook_registration {
                return unprocessable(json!({"address": ["for this topic has already been taken"]}));
            }
            let webhook = json!({
                "id": data.next_id(),
                "topic": body["webhook"]["topic"],
                "address": body["webhook"]["address"],
                "format": "json",
            });
            data.webhooks.push(webhook.clone());
            (StatusCode::CREATED, Json(json!({"webhook": webhook}))).into_response()
        }
        (&Method::POST, "graphql.json") => Json(json!({
            "data": {"shop": {"name": "Demo Store"}},
            "extensions": {"query": body["query"]},
        }))
        .into_response(),
        (&Method::POST, other) => {
            match other
                .strip_prefix("price_rules/")
                .and_then(|rest| rest.strip_suffix("/discount_codes.json"))
                .and_then(|id| id.parse::<i64>().ok())
            {
                Some(rule_id) => create_discount_code(&mut data, rule_id, &body),
                None => not_found(),
            }
        }
        _ => not_found(),
    }
}

/// Cursor pagination the way the REST Admin API does it: `page_info` is
/// opaque to clients and the next page is announced in a `Link` header.
fn list_price_rules(data: &MockData, uri: &Uri, headers: &HeaderMap) -> Response {
    let query: Vec<(String, String)> = url::form_urlencoded::parse(
        uri.query().unwrap_or_default().as_bytes(),
    )
    .into_owned()
    .collect();
    let param = |name: &str| {
        query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };

    let limit = param("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(50)
        .min(MOCK_PAGE_LIMIT);
    let offset = match param("page_info") {
        Some(cursor) => match cursor
            .strip_prefix("after-")
            .and_then(|n| n.parse::<usize>().ok())
        {
            Some(offset) => offset,
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"errors": {"page_info": "Invalid value."}})),
                )
                    .into_response();
            }
        },
        None => 0,
    };

    let end = (offset + limit).min(data.price_rules.len());
    let page = data.price_rules.get(offset..end).unwrap_or_default();
    let mut response = Json(json!({"price_rules": page})).into_response();

    if end < data.price_rules.len() {
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        let link = format!(
            "<http://{host}{}?limit={limit}&page_info=after-{end}>; rel=\"next\"",
            uri.path()
        );
        response
            .headers_mut()
            .insert(header::LINK, link.parse().expect("link header"));
    }
    response
}

fn exchange_token(body: &Value) -> Response {
    if body["client_id"] != API_KEY || body["client_secret"] != API_SECRET {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid_client"})),
        )
            .into_response();
    }
    if body["code"] == REJECTED_CODE {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_request"})),
        )
            .into_response();
    }
    Json(json!({"access_token": ACCESS_TOKEN, "scope": SCOPES})).into_response()
}

fn create_discount_code(data: &mut MockData, rule_id: i64, body: &Value) -> Response {
    if !data.price_rules.iter().any(|rule| rule["id"] == rule_id) {
        return not_found();
    }
    let code = body["discount_code"]["code"].as_str().unwrap_or_default();
    if data.discount_codes.iter().any(|c| c["code"] == code) {
        return unprocessable(json!({"code": ["must be unique. Please try a different code."]}));
    }

    let discount_code = json!({
        "id": data.next_id(),
        "price_rule_id": rule_id,
        "code": code,
        "usage_count": 0,
        "created_at": Utc::now().to_rfc3339(),
    });
    data.discount_codes.push(discount_code.clone());
    (
        StatusCode::CREATED,
        Json(json!({"discount_code": discount_code})),
    )
        .into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"errors": "Not Found"}))).into_response()
}

fn unprocessable(errors: Value) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({"errors": errors})),
    )
        .into_response()
}

// =============================================================================
// Application under test
// =============================================================================

/// Configuration pointing every upstream at `upstream`.
#[must_use]
pub fn test_config(upstream: &Url) -> AppConfig {
    AppConfig {
        bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        public_url: Url::parse(PUBLIC_URL).expect("public url"),
        shopify: ShopifyAppConfig {
            api_key: API_KEY.to_string(),
            api_secret: SecretString::from(API_SECRET),
            scopes: AccessScopes::parse(SCOPES),
            api_version: API_VERSION.to_string(),
            admin_origin: Some(upstream.clone()),
        },
        render_origin: upstream.clone(),
        price_rule_title: PLACEHOLDER_TITLE.to_string(),
        database_url: None,
        log_json: false,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// The server running against a [`MockUpstream`].
pub struct TestApp {
    pub url: String,
    pub client: reqwest::Client,
    pub upstream: MockUpstream,
    pub sessions: MemorySessionStore,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let upstream = MockUpstream::spawn().await;
        let sessions = MemorySessionStore::new();
        let state = AppState::new(
            test_config(&upstream.url),
            Sessions::Memory(sessions.clone()),
        )
        .expect("app state");
        let addr = serve(routes::app(state)).await;

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("http client");

        Self {
            url: format!("http://{addr}"),
            client,
            upstream,
            sessions,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.url)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request")
    }

    pub async fn post(&self, path: &str, body: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("POST request")
    }

    /// `GET` as the embedded front end of `shop`, with a fresh session token.
    pub async fn get_as(&self, shop: &str, path: &str) -> reqwest::Response {
        self.get_with_token(&session_token(shop), path).await
    }

    /// `POST` as the embedded front end of `shop`, with a fresh session token.
    pub async fn post_as(&self, shop: &str, path: &str, body: &str) -> reqwest::Response {
        self.post_with_token(&session_token(shop), path, body).await
    }

    pub async fn get_with_token(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("GET request")
    }

    pub async fn post_with_token(&self, token: &str, path: &str, body: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("POST request")
    }

    /// Store a session as if `shop` had completed OAuth.
    pub async fn seed_session(&self, shop: &str) {
        let session = ShopSession {
            shop: ShopDomain::parse(shop).expect("shop domain"),
            access_token: SecretString::from(ACCESS_TOKEN),
            scope: AccessScopes::parse(SCOPES),
            obtained_at: Utc::now(),
        };
        self.sessions.put(session).await.expect("store session");
    }

    pub async fn session(&self, shop: &str) -> Option<ShopSession> {
        let shop = ShopDomain::parse(shop).expect("shop domain");
        self.sessions.get(&shop).await.expect("load session")
    }

    /// Start OAuth and return the `state` nonce from Shopify's authorize URL.
    pub async fn begin_auth(&self, shop: &str) -> String {
        let response = self.get(&format!("/auth?shop={shop}")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let authorize = Url::parse(location(&response)).expect("authorize url");
        authorize
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .expect("state parameter")
    }

    /// Run the full OAuth round trip and return the callback response.
    pub async fn install(&self, shop: &str, host: &str) -> reqwest::Response {
        let state = self.begin_auth(shop).await;
        self.callback(&[
            ("code", "authorization-code"),
            ("host", host),
            ("shop", shop),
            ("state", &state),
            ("timestamp", "1700000000"),
        ])
        .await
    }

    /// Call `/auth/callback` with a correctly signed query.
    pub async fn callback(&self, params: &[(&str, &str)]) -> reqwest::Response {
        let query = sign_callback_query(params, API_SECRET);
        self.get(&format!("/auth/callback?{query}")).await
    }

    /// Deliver a signed webhook.
    pub async fn send_webhook(&self, topic: &str, shop: &str) -> reqwest::Response {
        let body = json!({"id": 1, "domain": shop}).to_string();
        self.client
            .post(self.url("/webhooks"))
            .header(header::CONTENT_TYPE, "application/json")
            .header(HMAC_HEADER, sign(body.as_bytes(), API_SECRET))
            .header(TOPIC_HEADER, topic)
            .header(SHOP_DOMAIN_HEADER, shop)
            .body(body)
            .send()
            .await
            .expect("webhook request")
    }
}

/// Claims Shopify puts in a session token for `shop`, valid for a minute.
#[must_use]
pub fn session_claims(shop: &str) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "iss": format!("https://{shop}/admin"),
        "dest": format!("https://{shop}"),
        "aud": API_KEY,
        "sub": "74861133",
        "exp": now + 60,
        "nbf": now - 1,
        "iat": now - 1,
        "jti": "f5e0c2b4-7b51-4b3c-9a3e-0b1c2d3e4f50",
        "sid": "a1b2c3d4e5f6",
    })
}

/// HS256-sign `claims` with `secret`.
#[must_use]
pub fn sign_session_token(claims: &Value, secret: &str) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("sign session token")
}

/// A valid session token for `shop`, signed with the app's secret.
#[must_use]
pub fn session_token(shop: &str) -> String {
    sign_session_token(&session_claims(shop), API_SECRET)
}

/// The `Location` header of a redirect.
#[must_use]
pub fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("Location header")
}

/// `[A-Z0-9]{12}`
#[must_use]
pub fn is_discount_code(code: &str) -> bool {
    code.len() == 12
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    addr
}
