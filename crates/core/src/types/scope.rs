//! Access scope sets granted to an app installation.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A set of Shopify access scopes (e.g. `read_products,write_price_rules`).
///
/// Shopify reports scopes as a comma-separated string. Order and duplicates
/// carry no meaning, so the set is normalized on parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AccessScopes(BTreeSet<String>);

impl AccessScopes {
    /// Parse a comma-separated scope list. Blank entries are dropped.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        Self(
            s.split(',')
                .map(str::trim)
                .filter(|scope| !scope.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    /// Returns true if no scopes are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if `scope` was granted, directly or implied.
    ///
    /// A `write_x` scope implies `read_x`.
    #[must_use]
    pub fn grants(&self, scope: &str) -> bool {
        if self.0.contains(scope) {
            return true;
        }
        scope
            .strip_prefix("read_")
            .is_some_and(|resource| self.0.contains(&format!("write_{resource}")))
    }

    /// Returns true if every scope in `required` is granted.
    #[must_use]
    pub fn covers(&self, required: &Self) -> bool {
        required.0.iter().all(|scope| self.grants(scope))
    }

    /// Iterate over the scopes in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for AccessScopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.0.iter().map(String::as_str).collect::<Vec<_>>().join(",");
        f.write_str(&joined)
    }
}

impl From<String> for AccessScopes {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<&str> for AccessScopes {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<AccessScopes> for String {
    fn from(scopes: AccessScopes) -> Self {
        scopes.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        let scopes = AccessScopes::parse(" write_price_rules, read_products,,read_products ");
        assert_eq!(scopes.to_string(), "read_products,write_price_rules");
    }

    #[test]
    fn test_parse_empty() {
        assert!(AccessScopes::parse("").is_empty());
        assert!(AccessScopes::parse(" , ").is_empty());
    }

    #[test]
    fn test_write_implies_read() {
        let scopes = AccessScopes::parse("write_price_rules");
        assert!(scopes.grants("read_price_rules"));
        assert!(scopes.grants("write_price_rules"));
        assert!(!scopes.grants("read_discounts"));
    }

    #[test]
    fn test_covers() {
        let granted = AccessScopes::parse("write_price_rules,write_discounts");
        assert!(granted.covers(&AccessScopes::parse("read_price_rules,write_discounts")));
        assert!(!granted.covers(&AccessScopes::parse("read_orders")));
        assert!(granted.covers(&AccessScopes::default()));
    }

    #[test]
    fn test_serde_as_string() {
        let scopes = AccessScopes::parse("b,a");
        let json = serde_json::to_string(&scopes).unwrap_or_default();
        assert_eq!(json, "\"a,b\"");
    }
}
