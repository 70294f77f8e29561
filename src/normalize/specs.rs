//! Spec table canonicalization: near-identical keys (case and
//! whitespace variants) collapse to one entry.

use std::collections::BTreeMap;

/// Deduplicates raw spec key-value pairs.
///
/// Keys are compared case-insensitively with whitespace collapsed and
/// trailing colons dropped. The first occurrence supplies the stored
/// key spelling; the first non-empty value wins.
#[must_use]
pub fn normalize_specs(raw: &[(String, String)]) -> BTreeMap<String, String> {
    let mut canonical_to_key: BTreeMap<String, String> = BTreeMap::new();
    let mut out: BTreeMap<String, String> = BTreeMap::new();

    for (key, value) in raw {
        let display = key.trim().trim_end_matches(':').trim().to_string();
        let canonical = canonical_form(&display);
        if canonical.is_empty() {
            continue;
        }
        let value = value.trim().to_string();

        match canonical_to_key.get(&canonical) {
            Some(existing) => {
                let slot = out.entry(existing.clone()).or_default();
                if slot.is_empty() && !value.is_empty() {
                    *slot = value;
                }
            }
            None => {
                canonical_to_key.insert(canonical, display.clone());
                out.insert(display, value);
            }
        }
    }

    out
}

fn canonical_form(key: &str) -> String {
    key.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn case_and_whitespace_variants_collapse() {
        let specs = normalize_specs(&pairs(&[
            ("Weight", "2 kg"),
            ("weight ", "2 kg"),
            ("WEIGHT:", "2 kg"),
            ("Color", "red"),
        ]));
        assert_eq!(specs.len(), 2);
        assert_eq!(specs.get("Weight").map(String::as_str), Some("2 kg"));
        assert_eq!(specs.get("Color").map(String::as_str), Some("red"));
    }

    #[test]
    fn first_non_empty_value_wins() {
        let specs = normalize_specs(&pairs(&[("Material", ""), ("material", "steel")]));
        assert_eq!(specs.get("Material").map(String::as_str), Some("steel"));
    }

    #[test]
    fn empty_keys_are_dropped() {
        let specs = normalize_specs(&pairs(&[("  ", "x"), (":", "y")]));
        assert!(specs.is_empty());
    }
}
