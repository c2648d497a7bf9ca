//! Price rule routes.

use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use chrono::Utc;
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::RequireShopSession;
use crate::services::{PriceRuleService, PriceRuleTemplate};
use crate::shopify::{PriceRule, PriceRuleEnvelope, PriceRulesEnvelope};
use crate::state::AppState;

/// GET /pricerule - List the shop's price rules.
#[instrument(skip_all, fields(shop = %session.shop))]
pub async fn list(
    State(state): State<AppState>,
    RequireShopSession(session): RequireShopSession,
) -> Result<Json<PriceRulesEnvelope>, AppError> {
    let service = PriceRuleService::new(state.shopify().rest(&session));
    let price_rules = service.list().await?;
    Ok(Json(PriceRulesEnvelope { price_rules }))
}

/// POST /pricerule/new - Create a price rule.
///
/// Accepts an optional JSON [`PriceRuleTemplate`]; an empty body creates the
/// default rule.
#[instrument(skip_all, fields(shop = %session.shop))]
pub async fn create(
    State(state): State<AppState>,
    RequireShopSession(session): RequireShopSession,
    body: Bytes,
) -> Result<(StatusCode, Json<PriceRuleEnvelope<PriceRule>>), AppError> {
    let template: PriceRuleTemplate = super::optional_json(&body)?;
    let input = template
        .into_input(&state.config().price_rule_title, Utc::now())
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let service = PriceRuleService::new(state.shopify().rest(&session));
    let price_rule = service.create(&input).await?;
    Ok((StatusCode::CREATED, Json(PriceRuleEnvelope { price_rule })))
}
