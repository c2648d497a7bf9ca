//! OAuth installation: `/auth` and `/auth/callback`.

#![allow(clippy::unwrap_used)]

use promo_bridge_integration_tests::{
    ACCESS_TOKEN, API_KEY, DEMO_HOST, DEMO_SHOP, PUBLIC_URL, REJECTED_CODE, SCOPES, TestApp,
    location,
};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use url::Url;

#[tokio::test]
async fn test_begin_redirects_to_shopify_authorize() {
    let app = TestApp::spawn().await;

    let response = app.get(&format!("/auth?shop={DEMO_SHOP}")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let authorize = Url::parse(location(&response)).unwrap();
    assert_eq!(authorize.path(), "/admin/oauth/authorize");

    let pairs: Vec<(String, String)> = authorize.query_pairs().into_owned().collect();
    let param = |name: &str| {
        pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .unwrap()
    };
    assert_eq!(param("client_id"), API_KEY);
    assert_eq!(param("scope"), SCOPES);
    assert_eq!(param("redirect_uri"), format!("{PUBLIC_URL}/auth/callback"));
    assert!(!param("state").is_empty());
}

#[tokio::test]
async fn test_begin_rejects_bad_shop() {
    let app = TestApp::spawn().await;

    let response = app.get("/auth").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.get("/auth?shop=evil.example.com").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_installs_shop() {
    let app = TestApp::spawn().await;

    let response = app.install(DEMO_SHOP, DEMO_HOST).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    // shop and host come back verbatim
    let redirect = Url::parse(&format!("{}{}", app.url, location(&response))).unwrap();
    assert_eq!(redirect.path(), "/");
    let pairs: Vec<(String, String)> = redirect.query_pairs().into_owned().collect();
    assert_eq!(
        pairs,
        vec![
            ("shop".to_string(), DEMO_SHOP.to_string()),
            ("host".to_string(), DEMO_HOST.to_string()),
        ]
    );

    // exactly one session
    assert_eq!(app.sessions.len().await, 1);
    let session = app.session(DEMO_SHOP).await.unwrap();
    assert_eq!(session.access_token.expose_secret(), ACCESS_TOKEN);
    assert_eq!(session.scope.to_string(), SCOPES);

    // exactly one uninstall webhook registration
    let registrations = app.upstream.requests_to(&Method::POST, "/webhooks.json");
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].access_token.as_deref(), Some(ACCESS_TOKEN));
    assert_eq!(registrations[0].body["webhook"]["topic"], "app/uninstalled");
    assert_eq!(
        registrations[0].body["webhook"]["address"],
        format!("{PUBLIC_URL}/webhooks").as_str()
    );

    // the redirect target now renders
    let response = app.get(location(&response)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_callback_survives_webhook_registration_failure() {
    let app = TestApp::spawn().await;
    app.upstream.data().fail_webhook_registration = true;

    let response = app.install(DEMO_SHOP, DEMO_HOST).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(app.session(DEMO_SHOP).await.is_some());
    assert_eq!(
        app.upstream.requests_to(&Method::POST, "/webhooks.json").len(),
        1
    );
}

#[tokio::test]
async fn test_reinstall_overwrites_session() {
    let app = TestApp::spawn().await;

    app.install(DEMO_SHOP, DEMO_HOST).await;
    app.install(DEMO_SHOP, DEMO_HOST).await;

    assert_eq!(app.sessions.len().await, 1);
}

#[tokio::test]
async fn test_callback_rejects_bad_signature() {
    let app = TestApp::spawn().await;
    let state = app.begin_auth(DEMO_SHOP).await;

    let response = app
        .get(&format!(
            "/auth/callback?code=abc&shop={DEMO_SHOP}&state={state}&timestamp=1700000000&hmac=deadbeef"
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.session(DEMO_SHOP).await.is_none());
}

#[tokio::test]
async fn test_callback_rejects_unknown_state() {
    let app = TestApp::spawn().await;

    let response = app
        .callback(&[
            ("code", "authorization-code"),
            ("host", DEMO_HOST),
            ("shop", DEMO_SHOP),
            ("state", "never-issued"),
            ("timestamp", "1700000000"),
        ])
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.session(DEMO_SHOP).await.is_none());
}

#[tokio::test]
async fn test_callback_state_is_single_use() {
    let app = TestApp::spawn().await;
    let state = app.begin_auth(DEMO_SHOP).await;
    let params = [
        ("code", "authorization-code"),
        ("host", DEMO_HOST),
        ("shop", DEMO_SHOP),
        ("state", state.as_str()),
        ("timestamp", "1700000000"),
    ];

    assert_eq!(app.callback(&params).await.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        app.callback(&params).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_callback_token_exchange_failure() {
    let app = TestApp::spawn().await;
    let state = app.begin_auth(DEMO_SHOP).await;

    let response = app
        .callback(&[
            ("code", REJECTED_CODE),
            ("host", DEMO_HOST),
            ("shop", DEMO_SHOP),
            ("state", &state),
            ("timestamp", "1700000000"),
        ])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "oauth_failed");
    assert!(app.session(DEMO_SHOP).await.is_none());
}

#[tokio::test]
async fn test_callback_denied_by_merchant() {
    let app = TestApp::spawn().await;

    let response = app
        .get(&format!(
            "/auth/callback?error=access_denied&shop={DEMO_SHOP}"
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
