//! Price rule listing and creation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use crate::shopify::{
    AllocationMethod, CustomerSelection, PriceRule, PriceRuleEnvelope, PriceRuleInput,
    PriceRulesEnvelope, RestClient, ShopifyError, TargetSelection, TargetType, ValueType,
};

/// Largest page the REST Admin API returns.
const PAGE_LIMIT: &str = "250";

/// A template was rejected before reaching Shopify.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidTemplate {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("value must be negative or zero (got {0})")]
    PositiveValue(Decimal),
    #[error("percentage value must be between -100 and 0 (got {0})")]
    PercentageOutOfRange(Decimal),
}

/// Caller-supplied overrides for a new price rule.
///
/// Every field is optional; see [`PriceRuleTemplate::into_input`] for the
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PriceRuleTemplate {
    pub title: Option<String>,
    pub value_type: Option<ValueType>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub value: Option<Decimal>,
    pub starts_at: Option<DateTime<Utc>>,
}

impl PriceRuleTemplate {
    /// Resolve the template into a create request.
    ///
    /// Defaults: `default_title`, line items, all targets, allocated across,
    /// 10% off, every customer, starting at `now`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTemplate` for an empty title or a value Shopify would
    /// refuse.
    pub fn into_input(
        self,
        default_title: &str,
        now: DateTime<Utc>,
    ) -> Result<PriceRuleInput, InvalidTemplate> {
        let title = self
            .title
            .map_or_else(|| default_title.to_string(), |t| t.trim().to_string());
        if title.is_empty() {
            return Err(InvalidTemplate::EmptyTitle);
        }

        let value_type = self.value_type.unwrap_or(ValueType::Percentage);
        let value = self.value.unwrap_or_else(|| Decimal::new(-100, 1));
        if value > Decimal::ZERO {
            return Err(InvalidTemplate::PositiveValue(value));
        }
        if value_type == ValueType::Percentage && value < Decimal::from(-100) {
            return Err(InvalidTemplate::PercentageOutOfRange(value));
        }

        Ok(PriceRuleInput {
            title,
            target_type: TargetType::LineItem,
            target_selection: TargetSelection::All,
            allocation_method: AllocationMethod::Across,
            value_type,
            value,
            customer_selection: CustomerSelection::All,
            starts_at: self.starts_at.unwrap_or(now),
        })
    }
}

/// First rule whose title equals `title` exactly.
#[must_use]
pub fn select_by_title<'r>(rules: &'r [PriceRule], title: &str) -> Option<&'r PriceRule> {
    rules.iter().find(|rule| rule.title == title)
}

/// Price rule operations for one shop.
pub struct PriceRuleService<'a> {
    rest: RestClient<'a>,
}

impl<'a> PriceRuleService<'a> {
    #[must_use]
    pub const fn new(rest: RestClient<'a>) -> Self {
        Self { rest }
    }

    /// All price rules of the shop, as Shopify returns them.
    ///
    /// Follows `page_info` cursors until the last page.
    ///
    /// # Errors
    ///
    /// Propagates the `ShopifyError` of any page request.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<PriceRule>, ShopifyError> {
        let mut rules = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![("limit", PAGE_LIMIT)];
            if let Some(page_info) = cursor.as_deref() {
                query.push(("page_info", page_info));
            }
            let page = self
                .rest
                .get_page::<PriceRulesEnvelope>("price_rules", &query)
                .await?;
            rules.extend(page.body.price_rules);

            match page.next_page_info {
                Some(next) if cursor.as_ref() != Some(&next) => cursor = Some(next),
                _ => break,
            }
        }

        tracing::debug!(count = rules.len(), "Listed price rules");
        Ok(rules)
    }

    /// Create a price rule.
    ///
    /// # Errors
    ///
    /// Propagates the `ShopifyError` of the create call.
    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create(&self, input: &PriceRuleInput) -> Result<PriceRule, ShopifyError> {
        let envelope: PriceRuleEnvelope<PriceRule> = self
            .rest
            .post("price_rules", &PriceRuleEnvelope { price_rule: input })
            .await?;
        tracing::info!(price_rule_id = %envelope.price_rule.id, "Created price rule");
        Ok(envelope.price_rule)
    }

    /// First price rule titled `title`, if any.
    ///
    /// # Errors
    ///
    /// Propagates the `ShopifyError` of the list call.
    pub async fn find_by_title(&self, title: &str) -> Result<Option<PriceRule>, ShopifyError> {
        let rules = self.list().await?;
        Ok(select_by_title(&rules, title).cloned())
    }
}
