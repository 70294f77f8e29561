//! E-commerce extraction facade.
//!
//! Runs the ordered strategy chain over a rendered page and degrades
//! to base content extraction when nothing sufficient is found. A
//! caller holding a high-confidence learned pattern can promote one
//! strategy to the front of the chain; the rest still runs afterwards,
//! so a stale pattern costs speed, never correctness.

use scraper::Html;
use tracing::debug;

use crate::domain::{ExtractionResult, PageType, Platform, RawProduct, Strategy};
use crate::error::CrawlError;
use crate::extraction::{content, heuristics, microdata, pagination, platform, structured};

/// Extracts one rendered page into the shared result contract.
///
/// Every call yields a result: product and listing pages carry raw
/// product records, everything else degrades to article/generic
/// content with the base extractor's fields.
#[must_use]
pub fn extract_page(html: &str, url: &str, preferred: Option<Strategy>) -> ExtractionResult {
    let doc = Html::parse_document(html);
    let detected = platform::detect_platform(html);
    let base = content::extract_content(html, url);
    let hint = pagination::detect_pagination(&doc, url);

    for strategy in chain_order(preferred) {
        let products = run_strategy(strategy, &doc);
        if products.iter().any(RawProduct::is_sufficient) {
            let products: Vec<RawProduct> =
                products.into_iter().filter(RawProduct::is_sufficient).collect();
            let page_type = if products.len() > 1 {
                PageType::Listing
            } else {
                PageType::Product
            };
            debug!(
                url,
                platform = detected.as_str(),
                strategy = strategy.as_str(),
                records = products.len(),
                "strategy chain matched"
            );
            return ExtractionResult {
                url: url.to_string(),
                page_type,
                platform: detected,
                title: base.title.clone(),
                cleaned_text: base.cleaned_text,
                images: base.images,
                published_date: base.published_date,
                products,
                content_hash: base.content_hash,
                strategy,
                confidence: strategy_confidence(strategy),
                low_quality: false,
                pagination: hint,
                degradation: None,
            };
        }
    }

    // No structured product data: classify as article or generic and
    // keep the base extraction. A page on a recognized storefront
    // platform that still yielded no record gets flagged, so callers
    // can tell commerce pages the chain gave up on apart from pages
    // that never carried product markup.
    let page_type = if base.published_date.is_some() && !base.low_quality {
        PageType::Article
    } else {
        PageType::Generic
    };
    let degradation = (detected != Platform::Unknown).then(|| {
        CrawlError::ExtractionLowConfidence(format!(
            "no strategy produced a sufficient record for {url} ({} page)",
            detected.as_str()
        ))
    });
    debug!(url, page_type = page_type.as_str(), "degraded to generic content");

    ExtractionResult {
        url: url.to_string(),
        page_type,
        platform: detected,
        title: base.title,
        cleaned_text: base.cleaned_text,
        images: base.images,
        published_date: base.published_date,
        products: Vec::new(),
        content_hash: base.content_hash,
        strategy: Strategy::GenericContent,
        confidence: if base.low_quality { 0.1 } else { 0.4 },
        low_quality: base.low_quality,
        pagination: hint,
        degradation,
    }
}

/// The chain in trust order, with an optional learned strategy
/// promoted to the front.
fn chain_order(preferred: Option<Strategy>) -> Vec<Strategy> {
    let mut order = Vec::with_capacity(Strategy::CHAIN.len());
    if let Some(first) = preferred {
        if first != Strategy::GenericContent {
            order.push(first);
        }
    }
    for strategy in Strategy::CHAIN {
        if !order.contains(&strategy) {
            order.push(strategy);
        }
    }
    order
}

fn run_strategy(strategy: Strategy, doc: &Html) -> Vec<RawProduct> {
    match strategy {
        Strategy::StructuredData => structured::extract(doc),
        Strategy::Microdata => microdata::extract(doc),
        Strategy::DomHeuristics => heuristics::extract(doc),
        Strategy::GenericContent => Vec::new(),
    }
}

const fn strategy_confidence(strategy: Strategy) -> f64 {
    match strategy {
        Strategy::StructuredData => 0.95,
        Strategy::Microdata => 0.85,
        Strategy::DomHeuristics => 0.6,
        Strategy::GenericContent => 0.4,
    }
}
