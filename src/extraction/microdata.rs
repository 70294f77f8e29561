//! Semi-structured inline markup strategy: microdata `itemscope`
//! attributes and RDFa `typeof`/`property` annotations.

use scraper::{ElementRef, Html, Selector};

use crate::domain::RawProduct;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

/// Extracts product records from microdata/RDFa-annotated markup.
#[must_use]
pub fn extract(doc: &Html) -> Vec<RawProduct> {
    let mut products = Vec::new();

    let scopes = selector(r#"[itemtype*="schema.org/Product"]"#);
    for scope in doc.select(&scopes) {
        if let Some(product) = parse_scope(scope, PropKind::Itemprop) {
            products.push(product);
        }
    }

    if products.is_empty() {
        let rdfa = selector(r#"[typeof~="Product"], [typeof~="schema:Product"]"#);
        for scope in doc.select(&rdfa) {
            if let Some(product) = parse_scope(scope, PropKind::Property) {
                products.push(product);
            }
        }
    }

    products
}

#[derive(Clone, Copy)]
enum PropKind {
    Itemprop,
    Property,
}

impl PropKind {
    const fn attr(self) -> &'static str {
        match self {
            Self::Itemprop => "itemprop",
            Self::Property => "property",
        }
    }
}

fn parse_scope(scope: ElementRef<'_>, kind: PropKind) -> Option<RawProduct> {
    let name = prop_value(scope, kind, &["name"])?;

    let price = prop_value(scope, kind, &["price", "lowPrice"]);
    let currency = prop_value(scope, kind, &["priceCurrency"]);
    let price_text = price.map(|p| match &currency {
        Some(c) => format!("{p} {c}"),
        None => p,
    });

    Some(RawProduct {
        name: Some(name),
        price_text,
        availability_text: prop_value(scope, kind, &["availability"]),
        sku: prop_value(scope, kind, &["sku", "mpn", "productID"]),
        brand: prop_value(scope, kind, &["brand"]),
        description: prop_value(scope, kind, &["description"]),
        images: prop_images(scope, kind),
        ..RawProduct::default()
    })
}

/// Property values hide in different places depending on the element:
/// `content` for meta, `href` for links (schema availability URLs),
/// `src` for images, otherwise the text content.
fn element_value(el: ElementRef<'_>) -> Option<String> {
    let candidate = el
        .value()
        .attr("content")
        .or_else(|| el.value().attr("href"))
        .or_else(|| el.value().attr("src"))
        .map(str::to_string)
        .unwrap_or_else(|| el.text().collect::<String>());

    let trimmed = candidate.trim().to_string();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn prop_value(scope: ElementRef<'_>, kind: PropKind, names: &[&str]) -> Option<String> {
    for name in names {
        let sel = selector(&format!(r#"[{}~="{}"]"#, kind.attr(), name));
        if let Some(value) = scope.select(&sel).find_map(element_value) {
            return Some(value);
        }
    }
    None
}

fn prop_images(scope: ElementRef<'_>, kind: PropKind) -> Vec<String> {
    let sel = selector(&format!(r#"[{}~="image"]"#, kind.attr()));
    scope
        .select(&sel)
        .filter_map(element_value)
        .take(10)
        .collect()
}
