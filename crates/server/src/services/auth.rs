//! Completing a shop installation once OAuth has produced a token.

use tracing::instrument;

use crate::session::{SessionStore, SessionStoreError, ShopSession};
use crate::shopify::{ShopifyClient, Webhook, WebhookEnvelope, WebhookInput, WebhookTopic};

/// Outcome of [`complete_auth`].
#[derive(Debug, Clone)]
pub struct AuthCompletion {
    /// Where to send the merchant next.
    pub redirect_to: String,
    /// The uninstall subscription, if registration succeeded.
    pub webhook: Option<Webhook>,
}

/// Record the session, subscribe to `app/uninstalled` and build the redirect
/// back into the app.
///
/// A failed webhook registration is logged and does not fail the install.
///
/// # Errors
///
/// Returns `SessionStoreError` if the session cannot be stored.
#[instrument(skip(store, shopify, session), fields(shop = %session.shop))]
pub async fn complete_auth<S: SessionStore>(
    store: &S,
    shopify: &ShopifyClient,
    webhook_address: &str,
    session: ShopSession,
    host: &str,
) -> Result<AuthCompletion, SessionStoreError> {
    if !session.scope.covers(shopify.scopes()) {
        tracing::warn!(
            granted = %session.scope,
            requested = %shopify.scopes(),
            "Shop granted fewer scopes than requested"
        );
    }

    store.put(session.clone()).await?;
    tracing::info!("Stored shop session");

    let subscription = WebhookEnvelope {
        webhook: WebhookInput {
            topic: WebhookTopic::AppUninstalled.to_string(),
            address: webhook_address.to_string(),
            format: "json",
        },
    };
    let webhook = match shopify
        .rest(&session)
        .post::<_, WebhookEnvelope<Webhook>>("webhooks", &subscription)
        .await
    {
        Ok(created) => {
            tracing::info!(webhook_id = %created.webhook.id, "Registered uninstall webhook");
            Some(created.webhook)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to register uninstall webhook");
            None
        }
    };

    Ok(AuthCompletion {
        redirect_to: app_redirect(session.shop.as_str(), host),
        webhook,
    })
}

/// `/?shop=…&host=…`, both values carried over unchanged.
#[must_use]
pub fn app_redirect(shop: &str, host: &str) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    serializer.append_pair("shop", shop);
    serializer.append_pair("host", host);
    format!("/?{}", serializer.finish())
}
