//! Admin GraphQL passthrough.

use axum::{Json, body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::RequireShopSession;
use crate::state::AppState;

/// POST /graphql - Forward the request body to the shop's GraphQL endpoint.
///
/// The body must be a JSON object (`{"query": ..., "variables": ...}`). The
/// upstream status and JSON body are relayed unchanged.
#[instrument(skip_all, fields(shop = %session.shop))]
pub async fn proxy(
    State(state): State<AppState>,
    RequireShopSession(session): RequireShopSession,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid GraphQL body: {e}")))?;
    if !request.is_object() {
        return Err(AppError::BadRequest(
            "GraphQL body must be a JSON object".to_string(),
        ));
    }

    let response = state.shopify().graphql(&session, &request).await?;
    let status: StatusCode = response.status;
    Ok((status, Json(response.body)))
}
