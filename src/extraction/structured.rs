//! Structured linked-data strategy: schema-style JSON blocks embedded
//! in `<script type="application/ld+json">`. Highest-trust source —
//! runs before any DOM cleaning can remove the scripts.

use scraper::{Html, Selector};
use serde_json::Value;

use crate::domain::{RawProduct, RawVariant};

/// Extracts product records from all JSON-LD blocks in the document.
#[must_use]
pub fn extract(doc: &Html) -> Vec<RawProduct> {
    let scripts = Selector::parse(r#"script[type="application/ld+json"]"#)
        .expect("static selector must parse");

    let mut products = Vec::new();
    for script in doc.select(&scripts) {
        let raw = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        walk(&value, &mut products);
    }
    products
}

/// Recursively visits arrays and `@graph` containers looking for
/// `Product` nodes.
fn walk(value: &Value, out: &mut Vec<RawProduct>) {
    match value {
        Value::Array(items) => {
            for item in items {
                walk(item, out);
            }
        }
        Value::Object(map) => {
            if let Some(graph) = map.get("@graph") {
                walk(graph, out);
            }
            if is_product(map.get("@type")) {
                if let Some(product) = parse_product(value) {
                    out.push(product);
                }
            }
        }
        _ => {}
    }
}

fn is_product(type_field: Option<&Value>) -> bool {
    match type_field {
        Some(Value::String(s)) => s == "Product",
        Some(Value::Array(items)) => items
            .iter()
            .any(|t| t.as_str() == Some("Product")),
        _ => false,
    }
}

fn parse_product(value: &Value) -> Option<RawProduct> {
    let name = str_field(value, "name")?;

    let mut product = RawProduct {
        name: Some(name),
        sku: str_field(value, "sku").or_else(|| str_field(value, "mpn")),
        brand: nested_name(value.get("brand")),
        description: str_field(value, "description"),
        images: image_urls(value.get("image")),
        specs: additional_properties(value.get("additionalProperty")),
        ..RawProduct::default()
    };

    match value.get("offers") {
        Some(Value::Array(offers)) => {
            // First offer supplies the headline price; the rest become
            // variants.
            if let Some(first) = offers.first() {
                apply_offer(&mut product, first);
            }
            if offers.len() > 1 {
                product.variants = offers.iter().map(offer_to_variant).collect();
            }
        }
        Some(offer @ Value::Object(_)) => apply_offer(&mut product, offer),
        _ => {}
    }

    Some(product)
}

/// JSON-LD carries price and currency separately; recombine them so
/// the normalizer sees one self-describing token.
fn price_text(offer: &Value) -> Option<String> {
    let amount = match offer.get("price").or_else(|| offer.get("lowPrice")) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return None,
    };
    match offer.get("priceCurrency").and_then(Value::as_str) {
        Some(currency) => Some(format!("{amount} {currency}")),
        None => Some(amount),
    }
}

fn apply_offer(product: &mut RawProduct, offer: &Value) {
    product.price_text = price_text(offer);
    product.availability_text = str_field(offer, "availability");
    if product.sku.is_none() {
        product.sku = str_field(offer, "sku");
    }
}

fn offer_to_variant(offer: &Value) -> RawVariant {
    RawVariant {
        name: str_field(offer, "name"),
        sku: str_field(offer, "sku"),
        price_text: price_text(offer),
        availability_text: str_field(offer, "availability"),
        attributes: Vec::new(),
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn nested_name(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        obj @ Value::Object(_) => str_field(obj, "name"),
        _ => None,
    }
}

fn image_urls(value: Option<&Value>) -> Vec<String> {
    let mut urls = Vec::new();
    collect_images(value, &mut urls);
    urls
}

fn collect_images(value: Option<&Value>, out: &mut Vec<String>) {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => out.push(s.trim().to_string()),
        Some(Value::Array(items)) => {
            for item in items {
                collect_images(Some(item), out);
            }
        }
        Some(obj @ Value::Object(_)) => {
            if let Some(url) = str_field(obj, "url").or_else(|| str_field(obj, "contentUrl")) {
                out.push(url);
            }
        }
        _ => {}
    }
}

fn additional_properties(value: Option<&Value>) -> Vec<(String, String)> {
    let Some(Value::Array(props)) = value else {
        return Vec::new();
    };
    props
        .iter()
        .filter_map(|p| {
            let key = str_field(p, "name")?;
            let val = match p.get("value") {
                Some(Value::String(s)) => s.trim().to_string(),
                Some(Value::Number(n)) => n.to_string(),
                _ => return None,
            };
            Some((key, val))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: &str) -> Html {
        Html::parse_document(&format!(
            r#"<html><head><script type="application/ld+json">{json}</script></head></html>"#
        ))
    }

    #[test]
    fn parses_single_product_with_offer() {
        let html = doc(
            r#"{"@context":"https://schema.org","@type":"Product","name":"Trail Boot",
               "sku":"TB-42","image":["https://e.com/a.jpg"],
               "brand":{"@type":"Brand","name":"Acme"},
               "offers":{"@type":"Offer","price":"129.95","priceCurrency":"USD",
                         "availability":"https://schema.org/InStock"}}"#,
        );
        let products = extract(&html);
        assert_eq!(products.len(), 1);
        let p = &products[0];
        assert_eq!(p.name.as_deref(), Some("Trail Boot"));
        assert_eq!(p.sku.as_deref(), Some("TB-42"));
        assert_eq!(p.price_text.as_deref(), Some("129.95 USD"));
        assert_eq!(p.brand.as_deref(), Some("Acme"));
        assert!(p.is_sufficient());
    }

    #[test]
    fn walks_graph_containers() {
        let html = doc(
            r#"{"@context":"https://schema.org","@graph":[
               {"@type":"WebSite","name":"Shop"},
               {"@type":"Product","name":"Mug","offers":{"price":8.5,"priceCurrency":"EUR"}}]}"#,
        );
        let products = extract(&html);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].price_text.as_deref(), Some("8.5 EUR"));
    }

    #[test]
    fn multiple_offers_become_variants() {
        let html = doc(
            r#"{"@type":"Product","name":"Tee","offers":[
               {"sku":"T-S","price":"19.00","priceCurrency":"USD","name":"Small"},
               {"sku":"T-L","price":"21.00","priceCurrency":"USD","name":"Large"}]}"#,
        );
        let products = extract(&html);
        assert_eq!(products[0].variants.len(), 2);
        assert_eq!(products[0].variants[1].sku.as_deref(), Some("T-L"));
        assert_eq!(products[0].price_text.as_deref(), Some("19.00 USD"));
    }

    #[test]
    fn ignores_invalid_json_and_non_products() {
        let html = doc(r#"{"@type":"Article","name":"Post"}"#);
        assert!(extract(&html).is_empty());
        let broken = doc("{not json");
        assert!(extract(&broken).is_empty());
    }
}
