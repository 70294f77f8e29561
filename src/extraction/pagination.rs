//! Pagination affordance detection: explicit next links and
//! "load more" triggers, surfaced to the pagination crawler.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::domain::PaginationHint;

static NEXT_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(next|older|more results|→|›|»)\s*$").expect("valid pattern"));

static LOAD_MORE_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(load more|show more|view more)\b").expect("valid pattern"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

/// Finds the strongest pagination affordance on a page.
///
/// Preference order: `rel=next` (link or anchor), then anchors with
/// next-shaped text inside pagination containers, then load-more
/// triggers. A discovered link pointing back at the current page is
/// ignored.
#[must_use]
pub fn detect_pagination(doc: &Html, current_url: &str) -> Option<PaginationHint> {
    let base = Url::parse(current_url).ok()?;

    let rel_next = selector(r#"a[rel~="next"], link[rel~="next"]"#);
    for el in doc.select(&rel_next) {
        if let Some(hint) = resolve(&base, el.value().attr("href")) {
            return Some(hint);
        }
    }

    let candidates = selector(
        r#".pagination a[href], .pager a[href], nav[aria-label*="agination"] a[href], a[aria-label="Next"], a[aria-label="Next page"]"#,
    );
    for anchor in doc.select(&candidates) {
        let text = anchor.text().collect::<String>();
        let aria_next = anchor
            .value()
            .attr("aria-label")
            .is_some_and(|l| l.starts_with("Next"));
        if aria_next || NEXT_TEXT.is_match(&text) {
            if let Some(hint) = resolve(&base, anchor.value().attr("href")) {
                return Some(hint);
            }
        }
    }

    let buttons = selector("button, a[data-load-more], [class*='load-more']");
    for button in doc.select(&buttons) {
        let text = button.text().collect::<String>();
        if LOAD_MORE_TEXT.is_match(&text) || button.value().attr("data-load-more").is_some() {
            return Some(PaginationHint::LoadMore);
        }
    }

    None
}

fn resolve(base: &Url, href: Option<&str>) -> Option<PaginationHint> {
    let href = href?.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let absolute = base.join(href).ok()?;
    if absolute == *base {
        return None;
    }
    Some(PaginationHint::NextLink(absolute.to_string()))
}
