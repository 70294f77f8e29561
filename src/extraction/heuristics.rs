//! DOM-heuristic strategy: the lowest-trust rung of the chain.
//!
//! Looks for price-shaped text adjacent to purchase affordances,
//! SKU-pattern matches in body text and spec tables. Only used when
//! structured and semi-structured markup yielded nothing sufficient.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::domain::RawProduct;

static PRICE_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[€£$¥₹]|US\$|CA\$|A\$)\s*\d[\d.,\s]*|\d[\d.,]*\s*(?:EUR|USD|GBP|CHF|PLN|SEK|NOK|DKK|zł|kr)\b")
        .expect("valid price pattern")
});

static SKU_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:sku|item\s*(?:no|number)|part\s*(?:no|number)|model)\b[:#.\s]*([A-Za-z0-9][A-Za-z0-9_./-]{2,})")
        .expect("valid sku pattern")
});

static AVAILABILITY_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(out of stock|sold out|currently unavailable|pre-?order|back-?order|coming soon|in stock|ready to ship)\b")
        .expect("valid availability pattern")
});

static BUY_AFFORDANCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(add to (?:cart|basket|bag)|buy now|purchase)\b").expect("valid pattern")
});

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

/// Attempts a heuristic product record from unannotated markup.
/// Returns at most one record; listing-style repetition is below this
/// strategy's reliability floor.
#[must_use]
pub fn extract(doc: &Html) -> Vec<RawProduct> {
    let name = product_name(doc);
    let price_text = price_near_affordance(doc);
    let body_text = body_text(doc);

    let product = RawProduct {
        name,
        price_text,
        availability_text: AVAILABILITY_PHRASE
            .find(&body_text)
            .map(|m| m.as_str().to_string()),
        sku: SKU_PATTERN
            .captures(&body_text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
        images: og_images(doc),
        specs: spec_table_rows(doc),
        ..RawProduct::default()
    };

    if product.name.is_some() && (product.price_text.is_some() || product.sku.is_some()) {
        vec![product]
    } else {
        Vec::new()
    }
}

fn product_name(doc: &Html) -> Option<String> {
    let h1 = selector("h1");
    let from_h1 = doc
        .select(&h1)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());
    if from_h1.is_some() {
        return from_h1;
    }

    let og = selector(r#"meta[property="og:title"]"#);
    doc.select(&og)
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Prefers price text inside elements that also contain (or sit next
/// to) a purchase affordance; falls back to the first price-classed
/// element, then to any price-shaped text on the page.
fn price_near_affordance(doc: &Html) -> Option<String> {
    let containers = selector("div, section, form, article");
    for container in doc.select(&containers) {
        let text = container.text().collect::<String>();
        if text.chars().count() > 600 {
            continue;
        }
        if BUY_AFFORDANCE.is_match(&text) {
            if let Some(m) = PRICE_SHAPE.find(&text) {
                return Some(m.as_str().trim().to_string());
            }
        }
    }

    let price_classed = selector(r#"[class*="price"], [id*="price"]"#);
    for el in doc.select(&price_classed) {
        let text = el.text().collect::<String>();
        if let Some(m) = PRICE_SHAPE.find(&text) {
            return Some(m.as_str().trim().to_string());
        }
    }

    let body = selector("body");
    let text = doc.select(&body).next()?.text().collect::<String>();
    PRICE_SHAPE.find(&text).map(|m| m.as_str().trim().to_string())
}

fn og_images(doc: &Html) -> Vec<String> {
    let og = selector(r#"meta[property="og:image"]"#);
    doc.select(&og)
        .filter_map(|m| m.value().attr("content"))
        .map(str::to_string)
        .take(5)
        .collect()
}

fn body_text(doc: &Html) -> String {
    let body = selector("body");
    doc.select(&body)
        .next()
        .map(|b| b.text().collect::<String>())
        .unwrap_or_default()
}

/// Two-column rows from spec-looking tables, generic tables as a
/// fallback, capped to keep pathological pages bounded.
fn spec_table_rows(doc: &Html) -> Vec<(String, String)> {
    let spec_tables = selector(
        r#"table[class*="spec"], table[id*="spec"], [class*="specification"] table, table"#,
    );
    let row = selector("tr");
    let cell = selector("th, td");

    let mut specs = Vec::new();
    for table in doc.select(&spec_tables) {
        for tr in table.select(&row) {
            let cells: Vec<ElementRef<'_>> = tr.select(&cell).collect();
            if cells.len() != 2 {
                continue;
            }
            let key = cells[0].text().collect::<String>().trim().to_string();
            let value = cells[1].text().collect::<String>().trim().to_string();
            if !key.is_empty() && !value.is_empty() {
                specs.push((key, value));
            }
            if specs.len() >= 50 {
                return specs;
            }
        }
    }
    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_price_next_to_add_to_cart() {
        let html = Html::parse_document(
            r#"<html><body><h1>Garden Hose</h1>
               <div class="buy-box"><span class="price">£24.99</span>
               <button>Add to cart</button></div>
               <p>SKU: GH-100</p>
               <table><tr><th>Length</th><td>25 m</td></tr></table>
               </body></html>"#,
        );
        let products = extract(&html);
        assert_eq!(products.len(), 1);
        let p = &products[0];
        assert_eq!(p.name.as_deref(), Some("Garden Hose"));
        assert_eq!(p.price_text.as_deref(), Some("£24.99"));
        assert_eq!(p.sku.as_deref(), Some("GH-100"));
        assert_eq!(p.specs, vec![("Length".to_string(), "25 m".to_string())]);
    }

    #[test]
    fn availability_phrase_is_captured_verbatim() {
        let html = Html::parse_document(
            r#"<body><h1>Lamp</h1><div>$10 <button>Buy now</button></div>
               <p>Currently unavailable</p></body>"#,
        );
        let products = extract(&html);
        assert_eq!(
            products[0].availability_text.as_deref(),
            Some("Currently unavailable")
        );
    }

    #[test]
    fn page_without_commercial_signal_yields_nothing() {
        let html = Html::parse_document("<body><h1>About us</h1><p>We are a team.</p></body>");
        assert!(extract(&html).is_empty());
    }
}
