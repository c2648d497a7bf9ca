//! Shopify webhook receiver.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use tracing::instrument;

use crate::error::AppError;
use crate::session::SessionStore;
use crate::shopify::{WebhookTopic, webhooks};
use crate::state::AppState;

/// POST /webhooks - Verify and handle a webhook delivery.
///
/// `app/uninstalled` forgets the shop's session. Other topics are
/// acknowledged without action.
#[instrument(skip_all)]
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let event = webhooks::verify(&headers, &body, state.shopify().api_secret())?;

    match event.topic {
        WebhookTopic::AppUninstalled => {
            let removed = state.sessions().remove(&event.shop).await?;
            tracing::info!(shop = %event.shop, removed, "App uninstalled");
        }
        WebhookTopic::Other(topic) => {
            tracing::info!(shop = %event.shop, %topic, "Ignoring webhook topic");
        }
    }

    Ok(StatusCode::OK)
}
