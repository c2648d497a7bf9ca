//! Shopify OAuth installation routes.

use axum::{
    extract::{Query, RawQuery, State},
    response::{IntoResponse, Redirect, Response},
};
use promo_bridge_core::ShopDomain;
use serde::Deserialize;
use tracing::instrument;

use crate::error::AppError;
use crate::services::complete_auth;
use crate::session::ShopSession;
use crate::shopify::oauth::verify_callback_hmac;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BeginParams {
    pub shop: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub shop: Option<String>,
    pub host: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

fn parse_shop(raw: Option<&str>) -> Result<ShopDomain, AppError> {
    let raw = raw.ok_or_else(|| AppError::BadRequest("Missing shop parameter".to_string()))?;
    ShopDomain::parse(raw).map_err(|e| AppError::BadRequest(format!("Invalid shop: {e}")))
}

/// GET /auth - Start OAuth for a shop.
#[instrument(skip(state))]
pub async fn begin(
    State(state): State<AppState>,
    Query(params): Query<BeginParams>,
) -> Result<Response, AppError> {
    let shop = parse_shop(params.shop.as_deref())?;

    let nonce = state.oauth_states().issue(&shop).await;
    let auth_url = state
        .shopify()
        .authorization_url(&shop, &state.config().callback_url(), &nonce);

    tracing::info!(%shop, "Redirecting to Shopify OAuth");
    Ok(Redirect::to(&auth_url).into_response())
}

/// GET /auth/callback - Finish OAuth and install the app for the shop.
#[instrument(skip(state, raw_query, params), fields(shop = ?params.shop))]
pub async fn callback(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
    Query(params): Query<OAuthCallbackParams>,
) -> Result<Response, AppError> {
    if let Some(error) = &params.error {
        let description = params.error_description.as_deref().unwrap_or_default();
        tracing::warn!("Shopify OAuth error: {} - {}", error, description);
        return Err(AppError::Unauthorized(
            "OAuth authorization was denied".to_string(),
        ));
    }

    let raw_query = raw_query.unwrap_or_default();
    if !verify_callback_hmac(&raw_query, state.shopify().api_secret()) {
        return Err(AppError::Unauthorized(
            "Invalid OAuth callback signature".to_string(),
        ));
    }

    let shop = parse_shop(params.shop.as_deref())?;
    let code = params
        .code
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;
    let nonce = params
        .state
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Missing state parameter".to_string()))?;

    if !state.oauth_states().consume(nonce, &shop).await {
        return Err(AppError::Unauthorized(
            "Invalid or expired OAuth state".to_string(),
        ));
    }

    let token = state.shopify().exchange_code(&shop, code).await?;

    let completion = complete_auth(
        state.sessions(),
        state.shopify(),
        &state.config().webhook_address(),
        ShopSession::from(token),
        params.host.as_deref().unwrap_or_default(),
    )
    .await?;

    tracing::info!(
        %shop,
        uninstall_webhook = completion.webhook.is_some(),
        "Shop installed"
    );
    Ok(Redirect::to(&completion.redirect_to).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shop() {
        assert!(parse_shop(Some("demo.myshopify.com")).is_ok());
        assert!(matches!(parse_shop(None), Err(AppError::BadRequest(_))));
        assert!(matches!(
            parse_shop(Some("demo.example.com")),
            Err(AppError::BadRequest(_))
        ));
    }
}
