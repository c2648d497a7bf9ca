//! Discount code issuance under an existing price rule.

use promo_bridge_core::PriceRuleId;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use crate::shopify::{
    DiscountCode, DiscountCodeEnvelope, DiscountCodeInput, RestClient, ShopifyError,
};

use super::code::DiscountCodeGenerator;
use super::price_rules::PriceRuleService;

/// Errors raised while issuing a code.
#[derive(Debug, Error)]
pub enum DiscountError {
    /// No price rule carries the requested title.
    #[error("no price rule titled '{0}'")]
    NoMatchingRule(String),

    #[error(transparent)]
    Shopify(#[from] ShopifyError),
}

/// How the target price rule is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSelector {
    /// A known rule id; no lookup call is made.
    Id(PriceRuleId),
    /// First rule whose title matches exactly.
    Title(String),
}

/// JSON body of `POST /discount/new`; both fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssueRequest {
    pub price_rule_id: Option<PriceRuleId>,
    pub title: Option<String>,
}

impl IssueRequest {
    /// An explicit id wins over a title; with neither, `default_title` is used.
    #[must_use]
    pub fn selector(self, default_title: &str) -> RuleSelector {
        match (self.price_rule_id, self.title) {
            (Some(id), _) => RuleSelector::Id(id),
            (None, Some(title)) => RuleSelector::Title(title),
            (None, None) => RuleSelector::Title(default_title.to_string()),
        }
    }
}

/// Creates discount codes for one shop.
pub struct DiscountIssuer<'a> {
    rest: RestClient<'a>,
    generator: DiscountCodeGenerator,
}

impl<'a> DiscountIssuer<'a> {
    #[must_use]
    pub const fn new(rest: RestClient<'a>, generator: DiscountCodeGenerator) -> Self {
        Self { rest, generator }
    }

    /// Resolve the rule, generate a code and create it under the rule.
    ///
    /// # Errors
    ///
    /// Returns `DiscountError::NoMatchingRule` when a title lookup finds
    /// nothing, or the `ShopifyError` of the failing call.
    #[instrument(skip(self))]
    pub async fn issue(&self, selector: RuleSelector) -> Result<DiscountCode, DiscountError> {
        let price_rule_id = match selector {
            RuleSelector::Id(id) => id,
            RuleSelector::Title(title) => {
                let rules = PriceRuleService::new(self.rest);
                rules
                    .find_by_title(&title)
                    .await?
                    .ok_or(DiscountError::NoMatchingRule(title))?
                    .id
            }
        };

        let code = self.generator.generate();
        let path = format!("price_rules/{price_rule_id}/discount_codes");
        let envelope: DiscountCodeEnvelope<DiscountCode> = self
            .rest
            .post(
                &path,
                &DiscountCodeEnvelope {
                    discount_code: DiscountCodeInput { code },
                },
            )
            .await?;

        tracing::info!(
            %price_rule_id,
            discount_code_id = %envelope.discount_code.id,
            "Issued discount code"
        );
        Ok(envelope.discount_code)
    }
}
