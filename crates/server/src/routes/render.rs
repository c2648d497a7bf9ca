//! Rendering server passthrough.

use axum::{extract::Request, extract::State, response::Response};

use crate::error::AppError;
use crate::middleware::RequireShopSession;
use crate::state::AppState;

/// GET /_next/static/{*path}, GET /_next/webpack-hmr - Front-end assets.
///
/// Served without a session check.
pub async fn asset(State(state): State<AppState>, request: Request) -> Result<Response, AppError> {
    Ok(state.render().forward(request).await?)
}

/// GET /* - Pages for an installed shop.
///
/// Requests without a known `shop` are redirected to `/auth` by the extractor.
pub async fn page(
    State(state): State<AppState>,
    RequireShopSession(_session): RequireShopSession,
    request: Request,
) -> Result<Response, AppError> {
    Ok(state.render().forward(request).await?)
}
