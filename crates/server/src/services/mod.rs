//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Finishing an installation (session, uninstall webhook, redirect)
//! - `code` - Random discount code generation
//! - `discounts` - Issuing a discount code under a price rule
//! - `price_rules` - Listing and creating price rules

pub mod auth;
pub mod code;
pub mod discounts;
pub mod price_rules;

pub use auth::{AuthCompletion, app_redirect, complete_auth};
pub use code::{CODE_ALPHABET, CODE_LENGTH, DiscountCodeGenerator};
pub use discounts::{DiscountError, DiscountIssuer, IssueRequest, RuleSelector};
pub use price_rules::{InvalidTemplate, PriceRuleService, PriceRuleTemplate, select_by_title};
