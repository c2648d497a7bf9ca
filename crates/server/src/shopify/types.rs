//! REST Admin API resource types.
//!
//! Resources keep unrecognized fields in `extra` so list/create responses can
//! be relayed to the front end without dropping data.

use chrono::{DateTime, FixedOffset, Utc};
use promo_bridge_core::{DiscountCodeId, PriceRuleId, WebhookId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Price Rule Enums
// =============================================================================

/// What the discount applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    /// Line items in the cart.
    LineItem,
    /// Shipping lines.
    ShippingLine,
}

/// Which targets the discount is selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSelection {
    /// Every line item or shipping line.
    All,
    /// Only the entitled products/collections/countries.
    Entitled,
}

/// How the discount value is spread across targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMethod {
    /// Applied to each target individually.
    Each,
    /// Spread across all targets.
    Across,
}

/// Interpretation of the price rule `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Fixed amount in the shop currency.
    FixedAmount,
    /// Percentage off.
    Percentage,
}

/// Which customers the rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerSelection {
    /// Every customer.
    All,
    /// Customers matching prerequisite segments.
    Prerequisite,
}

// =============================================================================
// Price Rules
// =============================================================================

/// A price rule as returned by `GET /price_rules.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRule {
    pub id: PriceRuleId,
    pub title: String,
    pub target_type: TargetType,
    pub target_selection: TargetSelection,
    pub allocation_method: AllocationMethod,
    pub value_type: ValueType,
    /// Negative decimal string (e.g. `"-10.0"`).
    pub value: Decimal,
    pub customer_selection: CustomerSelection,
    pub starts_at: DateTime<FixedOffset>,
    #[serde(default)]
    pub ends_at: Option<DateTime<FixedOffset>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Body of `POST /price_rules.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRuleInput {
    pub title: String,
    pub target_type: TargetType,
    pub target_selection: TargetSelection,
    pub allocation_method: AllocationMethod,
    pub value_type: ValueType,
    pub value: Decimal,
    pub customer_selection: CustomerSelection,
    pub starts_at: DateTime<Utc>,
}

/// `{"price_rule": ...}` wrapper used by single-resource endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRuleEnvelope<T> {
    pub price_rule: T,
}

/// `{"price_rules": [...]}` wrapper used by the list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRulesEnvelope {
    pub price_rules: Vec<PriceRule>,
}

// =============================================================================
// Discount Codes
// =============================================================================

/// A discount code created under a price rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountCode {
    pub id: DiscountCodeId,
    pub price_rule_id: PriceRuleId,
    pub code: String,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<FixedOffset>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Body of `POST /price_rules/{id}/discount_codes.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscountCodeInput {
    pub code: String,
}

/// `{"discount_code": ...}` wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountCodeEnvelope<T> {
    pub discount_code: T,
}

// =============================================================================
// Webhooks
// =============================================================================

/// A webhook subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: WebhookId,
    pub topic: String,
    pub address: String,
    #[serde(default)]
    pub format: Option<String>,
}

/// Body of `POST /webhooks.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookInput {
    pub topic: String,
    pub address: String,
    pub format: &'static str,
}

/// `{"webhook": ...}` wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope<T> {
    pub webhook: T,
}
