//! # Normalized Product
//!
//! Canonical product shape, independent of the source page's
//! structure. Produced by the normalizer as a deterministic function
//! of raw extracted input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Canonical price. `amount` is `None` either for quote-only listings
/// or when the raw text was too ambiguous to parse.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Price {
    pub amount: Option<f64>,
    pub currency: Option<String>,
    /// "Contact for price" style listings: no amount by design.
    pub quote_only: bool,
}

/// Canonical availability. Absence of an explicit signal maps to
/// `Unknown`; availability is never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    OutOfStock,
    Preorder,
    #[default]
    Unknown,
}

/// A purchasable variant of a product, with its own price/SKU.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Variant {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub price: Price,
    pub availability: Availability,
    /// Variant-distinguishing attributes (size, color, ...).
    pub attributes: BTreeMap<String, String>,
}

/// A canonical product record.
///
/// Specs use a [`BTreeMap`] so that serialization and the identity
/// checks built on it stay deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedProduct {
    pub name: String,
    pub url: String,
    pub price: Price,
    pub availability: Availability,
    pub sku: Option<String>,
    pub images: Vec<String>,
    pub variants: Vec<Variant>,
    pub specs: BTreeMap<String, String>,
}

impl NormalizedProduct {
    /// Identity used for cross-page deduplication: SKU when present,
    /// otherwise the product URL.
    #[must_use]
    pub fn dedup_identity(&self) -> &str {
        self.sku.as_deref().unwrap_or(&self.url)
    }
}
