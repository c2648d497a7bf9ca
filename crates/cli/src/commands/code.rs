//! Local discount code generation.
//!
//! Uses the same generator as `POST /discount/new`; nothing is sent to Shopify.

use promo_bridge_server::services::DiscountCodeGenerator;

/// Print `count` codes of `length` characters, one per line.
#[allow(clippy::print_stdout)]
pub fn generate(count: usize, length: usize) {
    let generator = DiscountCodeGenerator::with_length(length);

    for _ in 0..count {
        println!("{}", generator.generate());
    }
}
