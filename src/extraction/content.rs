//! Base content extractor: readability-style main-text isolation.
//!
//! Candidate blocks are scored by text length discounted by link
//! density, which strips navigation, ad and footer noise without a
//! site-specific ruleset. Pages below the minimum word threshold are
//! flagged low quality but still yield a result.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Below this many words the result is flagged low quality.
pub const MIN_CONTENT_WORDS: usize = 40;

/// Elements whose subtree never contributes to cleaned text.
const NOISE_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "header", "footer", "aside", "form",
    "iframe", "svg", "button",
];

/// Output of the base extractor.
#[derive(Debug, Clone)]
pub struct ContentExtract {
    pub title: Option<String>,
    pub cleaned_text: String,
    pub images: Vec<String>,
    pub published_date: Option<DateTime<Utc>>,
    /// blake3 hex digest of the cleaned text.
    pub content_hash: String,
    pub word_count: usize,
    pub low_quality: bool,
}

/// Extracts title, main text, images and metadata from rendered HTML.
///
/// Always returns a result: a page with no main content yields empty
/// text flagged low quality.
#[must_use]
pub fn extract_content(html: &str, url: &str) -> ContentExtract {
    let doc = Html::parse_document(html);
    let base = Url::parse(url).ok();

    let title = extract_title(&doc);
    let cleaned_text = extract_main_text(&doc);
    let word_count = cleaned_text.split_whitespace().count();

    ContentExtract {
        title,
        images: extract_images(&doc, base.as_ref()),
        published_date: extract_published_date(&doc),
        content_hash: blake3::hash(cleaned_text.as_bytes()).to_hex().to_string(),
        low_quality: word_count < MIN_CONTENT_WORDS,
        word_count,
        cleaned_text,
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

fn extract_title(doc: &Html) -> Option<String> {
    let og = selector(r#"meta[property="og:title"]"#);
    if let Some(content) = doc
        .select(&og)
        .next()
        .and_then(|m| m.value().attr("content"))
    {
        let trimmed = content.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    let title = selector("title");
    doc.select(&title)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Picks the block with the best density score and returns its
/// whitespace-normalized text. Falls back to the whole body.
fn extract_main_text(doc: &Html) -> String {
    let candidates = selector("article, main, section, div, td");
    let mut best: Option<(f64, ElementRef<'_>)> = None;

    for element in doc.select(&candidates) {
        let text = collect_text(element);
        let len = text.chars().count();
        if len < 80 {
            continue;
        }
        let score = len as f64 * (1.0 - link_density(element, len));
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, element));
        }
    }

    let text = match best {
        Some((_, element)) => collect_text(element),
        None => {
            let body = selector("body");
            doc.select(&body).next().map(collect_text).unwrap_or_default()
        }
    };

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fraction of an element's text that sits inside anchors.
fn link_density(element: ElementRef<'_>, total_len: usize) -> f64 {
    if total_len == 0 {
        return 0.0;
    }
    let anchors = selector("a");
    let link_len: usize = element
        .select(&anchors)
        .map(|a| a.text().map(str::chars).map(Iterator::count).sum::<usize>())
        .sum();
    (link_len.min(total_len)) as f64 / total_len as f64
}

/// Depth-first text collection that skips noise subtrees.
fn collect_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text_into(element, &mut out);
    out
}

fn collect_text_into(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(el) = ElementRef::wrap(child) {
            if NOISE_TAGS.contains(&el.value().name()) {
                continue;
            }
            collect_text_into(el, out);
        }
    }
}

fn extract_images(doc: &Html, base: Option<&Url>) -> Vec<String> {
    let imgs = selector("img[src]");
    let mut seen = Vec::new();
    for img in doc.select(&imgs) {
        let Some(src) = img.value().attr("src") else {
            continue;
        };
        if src.starts_with("data:") {
            continue;
        }
        let resolved = match base {
            Some(base) => match base.join(src) {
                Ok(abs) => abs.to_string(),
                Err(_) => continue,
            },
            None => src.to_string(),
        };
        if !seen.contains(&resolved) {
            seen.push(resolved);
        }
        if seen.len() >= 20 {
            break;
        }
    }
    seen
}

fn extract_published_date(doc: &Html) -> Option<DateTime<Utc>> {
    let meta = selector(r#"meta[property="article:published_time"]"#);
    let raw = doc
        .select(&meta)
        .next()
        .and_then(|m| m.value().attr("content").map(str::to_string))
        .or_else(|| {
            let time = selector("time[datetime]");
            doc.select(&time)
                .next()
                .and_then(|t| t.value().attr("datetime").map(str::to_string))
        })?;

    parse_date(raw.trim())
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
