//! Promo Bridge server library.
//!
//! Backend for an embedded Shopify app: installs shops over OAuth, keeps one
//! session per shop, proxies Admin GraphQL, and issues discount codes under
//! the shop's price rules. Everything the router does not own is relayed to
//! the front-end rendering server.
//!
//! # Security
//!
//! Stored sessions hold per-shop Admin API access tokens. OAuth callbacks and
//! webhooks are authenticated with the app's API secret before any state
//! changes.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod render;
pub mod routes;
pub mod services;
pub mod session;
pub mod shopify;
pub mod state;
