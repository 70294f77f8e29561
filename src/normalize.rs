//! # Product Normalizer
//!
//! Pure functions turning raw price/availability/spec text into
//! canonical values. Everything here is deterministic and network-free:
//! the same raw input always produces the same [`NormalizedProduct`].
//!
//! Ambiguity is handled by leaving a field unset, never by guessing.

pub mod availability;
pub mod price;
pub mod specs;

pub use availability::normalize_availability;
pub use price::normalize_price;
pub use specs::normalize_specs;

use std::collections::BTreeMap;

use crate::domain::{Availability, NormalizedProduct, RawProduct, RawVariant, Variant};
use crate::error::CrawlError;

/// Canonicalizes one raw extracted record into the product shape the
/// rest of the system works with.
#[must_use]
pub fn normalize_product(raw: &RawProduct, url: &str) -> NormalizedProduct {
    NormalizedProduct {
        name: raw.name.clone().unwrap_or_default(),
        url: url.to_string(),
        price: raw
            .price_text
            .as_deref()
            .map(normalize_price)
            .unwrap_or_default(),
        availability: raw
            .availability_text
            .as_deref()
            .map(normalize_availability)
            .unwrap_or_default(),
        sku: raw.sku.clone(),
        images: raw.images.clone(),
        variants: raw.variants.iter().map(normalize_variant).collect(),
        specs: normalize_specs(&raw.specs),
    }
}

/// Fields whose raw signal was too ambiguous to canonicalize. Each is
/// reported as a [`CrawlError::NormalizationAmbiguous`] so callers can
/// log or ledger the unset field; the product itself stays usable.
#[must_use]
pub fn normalization_issues(raw: &RawProduct, product: &NormalizedProduct) -> Vec<CrawlError> {
    let mut issues = Vec::new();
    if let Some(text) = raw.price_text.as_deref() {
        if product.price.amount.is_none() && !product.price.quote_only {
            issues.push(CrawlError::NormalizationAmbiguous(format!(
                "price text {text:?} for '{}' parsed to no amount",
                product.name
            )));
        }
    }
    if let Some(text) = raw.availability_text.as_deref() {
        if product.availability == Availability::Unknown {
            issues.push(CrawlError::NormalizationAmbiguous(format!(
                "availability text {text:?} for '{}' matched no known state",
                product.name
            )));
        }
    }
    issues
}

fn normalize_variant(raw: &RawVariant) -> Variant {
    Variant {
        name: raw.name.clone(),
        sku: raw.sku.clone(),
        price: raw
            .price_text
            .as_deref()
            .map(normalize_price)
            .unwrap_or_default(),
        availability: raw
            .availability_text
            .as_deref()
            .map(normalize_availability)
            .unwrap_or_default(),
        attributes: raw
            .attributes
            .iter()
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Availability;

    #[test]
    fn normalization_is_idempotent_on_identical_input() {
        let raw = RawProduct {
            name: Some("Widget".into()),
            price_text: Some("€1.234,56".into()),
            availability_text: Some("In stock".into()),
            sku: Some("W-1".into()),
            specs: vec![
                ("Weight".into(), "2 kg".into()),
                ("weight ".into(), "2 kg".into()),
            ],
            ..RawProduct::default()
        };
        let a = normalize_product(&raw, "https://e.com/w");
        let b = normalize_product(&raw, "https://e.com/w");
        assert_eq!(a, b);
        assert_eq!(a.price.amount, Some(1234.56));
        assert_eq!(a.availability, Availability::InStock);
        assert_eq!(a.specs.len(), 1);
    }

    #[test]
    fn ambiguous_signals_are_reported_not_guessed() {
        let raw = RawProduct {
            name: Some("Widget".into()),
            price_text: Some("ask in store".into()),
            availability_text: Some("ships eventually".into()),
            ..RawProduct::default()
        };
        let p = normalize_product(&raw, "https://e.com/w");
        assert_eq!(p.price.amount, None);
        assert_eq!(p.availability, Availability::Unknown);

        let issues = normalization_issues(&raw, &p);
        assert_eq!(issues.len(), 2);
        assert!(issues
            .iter()
            .all(|i| matches!(i, CrawlError::NormalizationAmbiguous(_))));
    }

    #[test]
    fn clean_and_quote_only_input_reports_no_issues() {
        let raw = RawProduct {
            name: Some("Widget".into()),
            price_text: Some("Contact for price".into()),
            availability_text: Some("In stock".into()),
            ..RawProduct::default()
        };
        let p = normalize_product(&raw, "https://e.com/w");
        assert!(p.price.quote_only);
        assert!(normalization_issues(&raw, &p).is_empty());
    }

    #[test]
    fn missing_fields_stay_unset() {
        let raw = RawProduct {
            name: Some("Widget".into()),
            ..RawProduct::default()
        };
        let p = normalize_product(&raw, "https://e.com/w");
        assert_eq!(p.price.amount, None);
        assert!(!p.price.quote_only);
        assert_eq!(p.availability, Availability::Unknown);
        assert!(p.sku.is_none());
    }
}
