//! Unified error handling for the HTTP surface.
//!
//! Every error renders as an explicit status plus
//! `{"error": {"code": "...", "message": "..."}}`.

use axum::{
    Json,
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use promo_bridge_core::ShopDomain;
use serde_json::json;
use thiserror::Error;

use crate::render::RenderError;
use crate::services::DiscountError;
use crate::session::SessionStoreError;
use crate::shopify::webhooks::HMAC_HEADER;
use crate::shopify::{SessionTokenError, ShopifyError, WebhookError};

/// Tells embedded app front ends to restart OAuth.
pub const REAUTHORIZE_HEADER: HeaderName =
    HeaderName::from_static("x-shopify-api-request-failure-reauthorize");

/// Tells embedded app front ends to fetch a fresh session token and retry.
pub const RETRY_INVALID_SESSION_HEADER: HeaderName =
    HeaderName::from_static("x-shopify-retry-invalid-session-request");

/// Where the front end should send the merchant to re-authorize.
pub const REAUTHORIZE_URL_HEADER: HeaderName =
    HeaderName::from_static("x-shopify-api-request-failure-reauthorize-url");

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Shopify API operation failed.
    #[error("Shopify error: {0}")]
    Shopify(#[from] ShopifyError),

    /// Session backend failed.
    #[error("Session store error: {0}")]
    SessionStore(#[from] SessionStoreError),

    /// Webhook delivery failed validation.
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Rendering server could not be reached.
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// No price rule matched the requested title.
    #[error("No price rule titled '{0}'")]
    PriceRuleNotFound(String),

    /// The shop has no session; it must (re)install through `/auth`.
    #[error("Session required")]
    SessionRequired(Option<ShopDomain>),

    /// The API call carried a session token that failed verification.
    #[error("Invalid session token: {0}")]
    SessionToken(#[from] SessionTokenError),

    /// Request is not authentic.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with existing state.
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<DiscountError> for AppError {
    fn from(err: DiscountError) -> Self {
        match err {
            DiscountError::NoMatchingRule(title) => Self::PriceRuleNotFound(title),
            DiscountError::Shopify(e) if e.is_duplicate_code() => {
                Self::Conflict("Discount code already exists".to_string())
            }
            DiscountError::Shopify(e) => Self::Shopify(e),
        }
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Shopify(e) => match e {
                ShopifyError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                ShopifyError::NotFound(_) => StatusCode::NOT_FOUND,
                ShopifyError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
                ShopifyError::Rejected { status: 422, .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ShopifyError::Unreachable(_)
                | ShopifyError::Parse(_)
                | ShopifyError::Rejected { .. }
                | ShopifyError::OAuth(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Webhook(e) if is_signature_failure(e) => StatusCode::UNAUTHORIZED,
            Self::Webhook(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::SessionStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Render(_) => StatusCode::BAD_GATEWAY,
            Self::PriceRuleNotFound(_) => StatusCode::NOT_FOUND,
            Self::SessionRequired(_) | Self::SessionToken(_) | Self::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    /// Machine-readable error code for the JSON body.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Shopify(e) => match e {
                ShopifyError::Unreachable(_) => "upstream_unreachable",
                ShopifyError::Unauthorized(_) => "session_invalid",
                ShopifyError::NotFound(_) => "not_found",
                ShopifyError::RateLimited(_) => "rate_limited",
                ShopifyError::Rejected { status: 422, .. } => "upstream_rejected",
                ShopifyError::Parse(_) | ShopifyError::Rejected { .. } => "upstream_error",
                ShopifyError::OAuth(_) => "oauth_failed",
            },
            Self::Webhook(e) if is_signature_failure(e) => "invalid_signature",
            Self::Webhook(_) | Self::BadRequest(_) => "bad_request",
            Self::SessionStore(_) => "internal",
            Self::Render(_) => "render_unreachable",
            Self::PriceRuleNotFound(_) => "price_rule_not_found",
            Self::SessionRequired(_) => "session_required",
            Self::SessionToken(_) => "invalid_session_token",
            Self::Unauthorized(_) => "unauthorized",
            Self::Conflict(_) => "conflict",
        }
    }

    fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }
}

/// A missing or wrong signature is an authentication failure; anything else
/// about the delivery is a malformed request.
fn is_signature_failure(err: &WebhookError) -> bool {
    match err {
        WebhookError::InvalidSignature => true,
        WebhookError::MissingHeader(name) => *name == HMAC_HEADER,
        WebhookError::InvalidShop(_) => false,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::SessionStore(_) => "Internal server error".to_string(),
            Self::Shopify(ShopifyError::Unreachable(_)) => "Shopify is unreachable".to_string(),
            Self::Render(_) => "Rendering server is unreachable".to_string(),
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        }));
        let mut response = (status, body).into_response();

        match &self {
            Self::Shopify(ShopifyError::RateLimited(secs)) => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(*secs));
            }
            Self::SessionRequired(shop) => {
                let url = reauthorize_path(shop.as_ref());
                let headers = response.headers_mut();
                headers.insert(REAUTHORIZE_HEADER, HeaderValue::from_static("1"));
                if let Ok(value) = HeaderValue::from_str(&url) {
                    headers.insert(REAUTHORIZE_URL_HEADER, value);
                }
            }
            Self::SessionToken(_) => {
                response
                    .headers_mut()
                    .insert(RETRY_INVALID_SESSION_HEADER, HeaderValue::from_static("1"));
            }
            _ => {}
        }

        response
    }
}

/// `/auth`, with `?shop=` when the shop is known.
#[must_use]
pub fn reauthorize_path(shop: Option<&ShopDomain>) -> String {
    shop.map_or_else(
        || "/auth".to_string(),
        |shop| format!("/auth?shop={}", urlencoding::encode(shop.as_str())),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::SessionToken(SessionTokenError::Expired);
        assert_eq!(err.to_string(), "Invalid session token: session token has expired");

        let err = AppError::PriceRuleNotFound("REWARD_DISCOUNT".to_string());
        assert_eq!(err.to_string(), "No price rule titled 'REWARD_DISCOUNT'");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::PriceRuleNotFound("x".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::SessionRequired(None)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::BadRequest("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Conflict("x".to_string())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_shopify_error_mapping() {
        assert_eq!(
            get_status(ShopifyError::Unauthorized("revoked".to_string()).into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(ShopifyError::NotFound("price_rules/9".to_string()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(
                ShopifyError::Rejected {
                    status: 422,
                    body: "{}".to_string()
                }
                .into()
            ),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(
                ShopifyError::Rejected {
                    status: 500,
                    body: String::new()
                }
                .into()
            ),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = AppError::from(ShopifyError::RateLimited(4)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "4");
    }

    #[test]
    fn test_webhook_error_mapping() {
        assert_eq!(
            get_status(WebhookError::InvalidSignature.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(WebhookError::MissingHeader(HMAC_HEADER).into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(WebhookError::MissingHeader("x-shopify-topic").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(WebhookError::InvalidSignature).code(),
            "invalid_signature"
        );
        assert_eq!(
            AppError::from(WebhookError::MissingHeader("x-shopify-topic")).code(),
            "bad_request"
        );
    }

    #[test]
    fn test_duplicate_code_maps_to_conflict() {
        let err = AppError::from(DiscountError::Shopify(ShopifyError::Rejected {
            status: 422,
            body: r#"{"errors":{"code":["must be unique"]}}"#.to_string(),
        }));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "conflict");

        let err = AppError::from(DiscountError::NoMatchingRule("SPRING".to_string()));
        assert_eq!(err.code(), "price_rule_not_found");
    }

    #[test]
    fn test_session_required_sets_reauthorize_headers() {
        let shop = ShopDomain::parse("demo.myshopify.com").unwrap();
        let response = AppError::SessionRequired(Some(shop)).into_response();

        assert_eq!(response.headers()[&REAUTHORIZE_HEADER], "1");
        assert_eq!(
            response.headers()[&REAUTHORIZE_URL_HEADER],
            "/auth?shop=demo.myshopify.com"
        );
    }

    #[test]
    fn test_invalid_session_token_asks_for_retry() {
        let response = AppError::from(SessionTokenError::Invalid).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[&RETRY_INVALID_SESSION_HEADER], "1");
        assert!(response.headers().get(&REAUTHORIZE_HEADER).is_none());
    }

    #[test]
    fn test_reauthorize_path_without_shop() {
        assert_eq!(reauthorize_path(None), "/auth");
    }
}
