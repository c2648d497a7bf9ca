//! promo-bridge core - Shared types library.
//!
//! This crate provides common types used across all promo-bridge components:
//! - `server` - Shopify app backend (OAuth, webhooks, price rules, discount codes)
//! - `cli` - Command-line tools for migrations and session management
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for shop domains, access scopes and Shopify IDs

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
