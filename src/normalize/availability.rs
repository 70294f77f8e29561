//! Availability canonicalization. An unknown signal stays `Unknown`;
//! stock state is never inferred from the absence of a phrase.

use crate::domain::Availability;

const OUT_OF_STOCK: &[&str] = &[
    "out of stock",
    "outofstock",
    "out-of-stock",
    "sold out",
    "soldout",
    "currently unavailable",
    "no longer available",
    "discontinued",
];

const PREORDER: &[&str] = &[
    "preorder",
    "pre-order",
    "pre order",
    "backorder",
    "back-order",
    "coming soon",
    "available soon",
];

const IN_STOCK: &[&str] = &[
    "in stock",
    "instock",
    "in-stock",
    "available now",
    "ready to ship",
    "ships today",
    "add to cart",
    "add to basket",
];

/// Maps a raw availability signal to the canonical enum.
///
/// Checked most-specific first: schema.org `OutOfStock` and friends
/// must not be shadowed by the `stock` substring of looser phrases.
#[must_use]
pub fn normalize_availability(raw: &str) -> Availability {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return Availability::Unknown;
    }

    if OUT_OF_STOCK.iter().any(|p| lowered.contains(p)) {
        return Availability::OutOfStock;
    }
    if PREORDER.iter().any(|p| lowered.contains(p)) {
        return Availability::Preorder;
    }
    if IN_STOCK.iter().any(|p| lowered.contains(p)) {
        return Availability::InStock;
    }
    Availability::Unknown
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("In Stock", Availability::InStock)]
    #[case("http://schema.org/InStock", Availability::InStock)]
    #[case("Ready to ship within 24h", Availability::InStock)]
    #[case("Sold out", Availability::OutOfStock)]
    #[case("https://schema.org/OutOfStock", Availability::OutOfStock)]
    #[case("Currently unavailable", Availability::OutOfStock)]
    #[case("Pre-order now", Availability::Preorder)]
    #[case("http://schema.org/PreOrder", Availability::Preorder)]
    #[case("Available on backorder", Availability::Preorder)]
    #[case("Ships from our warehouse", Availability::Unknown)]
    #[case("", Availability::Unknown)]
    fn maps_signals(#[case] raw: &str, #[case] expected: Availability) {
        assert_eq!(normalize_availability(raw), expected, "for {raw:?}");
    }

    #[test]
    fn absence_is_never_in_stock() {
        assert_eq!(normalize_availability("free shipping"), Availability::Unknown);
    }
}
