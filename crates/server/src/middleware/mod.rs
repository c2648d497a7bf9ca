//! Request extractors and middleware.
//!
//! - [`RequireShopSession`] - resolves the requesting shop to its stored session

pub mod auth;

pub use auth::{RequireShopSession, ShopSessionRejection, is_api_path};
