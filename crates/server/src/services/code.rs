//! Discount code generation.

use rand::Rng;

/// Symbols a generated code is drawn from.
pub const CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Default code length.
pub const CODE_LENGTH: usize = 12;

/// Generates redeemable discount codes.
///
/// Each character is drawn uniformly from [`CODE_ALPHABET`] using the
/// thread-local CSPRNG. Uniqueness is not checked here; Shopify rejects a
/// duplicate code on creation.
#[derive(Debug, Clone, Copy)]
pub struct DiscountCodeGenerator {
    length: usize,
}

impl Default for DiscountCodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscountCodeGenerator {
    /// Generator producing [`CODE_LENGTH`]-character codes.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            length: CODE_LENGTH,
        }
    }

    /// Generator producing codes of `length` characters (at least one).
    #[must_use]
    pub const fn with_length(length: usize) -> Self {
        Self {
            length: if length == 0 { 1 } else { length },
        }
    }

    #[must_use]
    pub const fn length(&self) -> usize {
        self.length
    }

    /// Produce a new code.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut rng = rand::rng();
        (0..self.length)
            .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn is_code_char(c: char) -> bool {
        c.is_ascii_uppercase() || c.is_ascii_digit()
    }

    #[test]
    fn test_generate_format() {
        let generator = DiscountCodeGenerator::new();
        for _ in 0..200 {
            let code = generator.generate();
            assert_eq!(code.len(), 12);
            assert!(code.chars().all(is_code_char), "unexpected symbol in {code}");
        }
    }

    #[test]
    fn test_generate_distinct() {
        let generator = DiscountCodeGenerator::new();
        let codes: HashSet<String> = (0..1_000).map(|_| generator.generate()).collect();
        assert_eq!(codes.len(), 1_000);
    }

    #[test]
    fn test_alphabet_is_upper_alnum() {
        assert_eq!(CODE_ALPHABET.len(), 36);
        assert!(CODE_ALPHABET.iter().all(|&b| is_code_char(char::from(b))));
    }

    #[test]
    fn test_with_length() {
        assert_eq!(DiscountCodeGenerator::with_length(8).generate().len(), 8);
        assert_eq!(DiscountCodeGenerator::with_length(0).length(), 1);
    }

    #[test]
    fn test_every_symbol_reachable() {
        let generator = DiscountCodeGenerator::with_length(64);
        let seen: HashSet<char> = (0..200)
            .flat_map(|_| generator.generate().chars().collect::<Vec<_>>())
            .collect();
        assert_eq!(seen.len(), 36);
    }
}
