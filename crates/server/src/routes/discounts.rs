//! Discount code routes.

use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::RequireShopSession;
use crate::services::{DiscountIssuer, IssueRequest};
use crate::shopify::{DiscountCode, DiscountCodeEnvelope};
use crate::state::AppState;

/// POST /discount/new - Issue a discount code.
///
/// Body (optional): `{"price_rule_id": 123}` or `{"title": "SPRING"}`. With
/// neither, the configured placeholder title is looked up.
#[instrument(skip_all, fields(shop = %session.shop))]
pub async fn create(
    State(state): State<AppState>,
    RequireShopSession(session): RequireShopSession,
    body: Bytes,
) -> Result<(StatusCode, Json<DiscountCodeEnvelope<DiscountCode>>), AppError> {
    let request: IssueRequest = super::optional_json(&body)?;
    let selector = request.selector(&state.config().price_rule_title);

    let issuer = DiscountIssuer::new(state.shopify().rest(&session), state.codes());
    let discount_code = issuer.issue(selector).await?;
    Ok((StatusCode::CREATED, Json(DiscountCodeEnvelope { discount_code })))
}
