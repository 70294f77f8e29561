//! # Extraction Result Types
//!
//! The shared output contract of the extractors: every successfully
//! rendered page yields an [`ExtractionResult`] — extraction degrades
//! to generic content rather than failing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CrawlError;

/// Known storefront platforms plus the unknown catch-all.
/// Classification is advisory: it informs strategy confidence and
/// telemetry, never correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Shopify,
    WooCommerce,
    Magento,
    BigCommerce,
    PrestaShop,
    Unknown,
}

impl Platform {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Shopify => "shopify",
            Self::WooCommerce => "woocommerce",
            Self::Magento => "magento",
            Self::BigCommerce => "bigcommerce",
            Self::PrestaShop => "prestashop",
            Self::Unknown => "unknown",
        }
    }
}

/// Page-type classification produced by the extraction dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Product,
    Listing,
    Article,
    Generic,
}

impl PageType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Listing => "listing",
            Self::Article => "article",
            Self::Generic => "generic",
        }
    }
}

/// Extraction strategy, ordered by trust: structured linked data
/// first, DOM heuristics last, generic content as the fallback floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    StructuredData,
    Microdata,
    DomHeuristics,
    GenericContent,
}

impl Strategy {
    /// The full chain in priority order, excluding the generic floor.
    pub const CHAIN: [Self; 3] = [Self::StructuredData, Self::Microdata, Self::DomHeuristics];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StructuredData => "structured_data",
            Self::Microdata => "microdata",
            Self::DomHeuristics => "dom_heuristics",
            Self::GenericContent => "generic_content",
        }
    }
}

/// A raw product record as pulled from markup, before normalization.
/// All fields are verbatim page text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProduct {
    pub name: Option<String>,
    pub price_text: Option<String>,
    pub availability_text: Option<String>,
    pub sku: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub variants: Vec<RawVariant>,
    /// Raw spec key-value pairs, duplicates included.
    pub specs: Vec<(String, String)>,
}

impl RawProduct {
    /// A record is sufficiently complete when it names the product and
    /// carries at least one commercial signal. The strategy chain
    /// stops at the first sufficient record.
    #[must_use]
    pub fn is_sufficient(&self) -> bool {
        self.name.is_some()
            && (self.price_text.is_some()
                || self.availability_text.is_some()
                || self.sku.is_some())
    }
}

/// A raw variant row (its own price/SKU/attributes).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawVariant {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub price_text: Option<String>,
    pub availability_text: Option<String>,
    pub attributes: Vec<(String, String)>,
}

/// A pagination affordance discovered on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PaginationHint {
    /// Explicit next-page link, already resolved to an absolute URL.
    NextLink(String),
    /// "Load more" trigger whose target could not be resolved to a
    /// plain link; callers may synthesize a `?page=N+1` URL.
    LoadMore,
}

/// The result of extracting one rendered page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub url: String,
    pub page_type: PageType,
    /// Storefront platform fingerprinted from the raw markup.
    pub platform: Platform,
    pub title: Option<String>,
    pub cleaned_text: String,
    pub images: Vec<String>,
    pub published_date: Option<DateTime<Utc>>,
    /// Raw product records; present for product and listing pages.
    pub products: Vec<RawProduct>,
    /// blake3 hex digest of the cleaned text, for change detection.
    pub content_hash: String,
    pub strategy: Strategy,
    pub confidence: f64,
    /// Set when the page fell below the minimum-word threshold.
    pub low_quality: bool,
    pub pagination: Option<PaginationHint>,
    /// Populated when every product strategy ran and none produced a
    /// sufficient record, so the result fell back to generic content.
    pub degradation: Option<CrawlError>,
}
