//! Core types for promo-bridge.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod scope;
pub mod shop;

pub use id::*;
pub use scope::AccessScopes;
pub use shop::{ShopDomain, ShopDomainError};
