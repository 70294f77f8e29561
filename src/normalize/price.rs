//! Price canonicalization: currency detection, separator handling and
//! quote-only phrasing.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::Price;

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d.,\s'\u{a0}]*\d|\d").expect("valid number pattern"));

static CURRENCY_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(EUR|USD|GBP|CAD|AUD|NZD|JPY|CHF|INR|PLN|SEK|NOK|DKK|CZK|HUF)\b")
        .expect("valid currency code pattern")
});

/// Phrases meaning "no listed price by design".
const QUOTE_ONLY_PHRASES: &[&str] = &[
    "contact for price",
    "contact us for price",
    "call for price",
    "price on application",
    "price on request",
    "request a quote",
    "request quote",
    "quote only",
    "poa",
];

/// Symbols checked longest-first so that "CA$" wins over "$".
const CURRENCY_SYMBOLS: &[(&str, &str)] = &[
    ("US$", "USD"),
    ("CA$", "CAD"),
    ("AU$", "AUD"),
    ("A$", "AUD"),
    ("NZ$", "NZD"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("¥", "JPY"),
    ("₹", "INR"),
    ("zł", "PLN"),
    ("Kč", "CZK"),
    ("$", "USD"),
];

/// Parses raw price text into a canonical [`Price`].
///
/// Handles symbol and ISO-code currencies, European and US separator
/// conventions, VAT-inclusive phrasing (the numeric token is taken as
/// printed) and quote-only listings. Ambiguous input yields an unset
/// amount, never a guess.
#[must_use]
pub fn normalize_price(raw: &str) -> Price {
    let text = raw.trim();
    if text.is_empty() {
        return Price::default();
    }

    let lowered = text.to_lowercase();
    if QUOTE_ONLY_PHRASES.iter().any(|p| {
        if p.len() <= 3 {
            // Short tokens like "poa" must stand alone to count.
            lowered.split(|c: char| !c.is_alphanumeric()).any(|w| w == *p)
        } else {
            lowered.contains(p)
        }
    }) {
        return Price {
            amount: None,
            currency: detect_currency(text),
            quote_only: true,
        };
    }

    let currency = detect_currency(text);
    let amount = NUMBER
        .find(text)
        .and_then(|m| parse_amount(m.as_str()));

    Price {
        amount,
        currency,
        quote_only: false,
    }
}

fn detect_currency(text: &str) -> Option<String> {
    for (symbol, code) in CURRENCY_SYMBOLS {
        if text.contains(symbol) {
            return Some((*code).to_string());
        }
    }
    CURRENCY_CODE
        .find(text)
        .map(|m| m.as_str().to_string())
}

/// Resolves thousands vs. decimal separators for one numeric token.
fn parse_amount(token: &str) -> Option<f64> {
    let compact: String = token
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'' && *c != '\u{a0}')
        .collect();

    let last_dot = compact.rfind('.');
    let last_comma = compact.rfind(',');

    let normalized = match (last_dot, last_comma) {
        (Some(d), Some(c)) => {
            // Both present: the later one is the decimal separator.
            let (dec, thou) = if d > c { ('.', ',') } else { (',', '.') };
            compact
                .replace(thou, "")
                .replace(dec, ".")
        }
        (Some(_), None) => resolve_single_separator(&compact, '.'),
        (None, Some(_)) => resolve_single_separator(&compact, ','),
        (None, None) => compact,
    };

    normalized
        .parse::<f64>()
        .ok()
        .map(|v| (v * 100.0).round() / 100.0)
}

/// One separator kind only: repeated occurrences group thousands; a
/// single occurrence followed by exactly three digits does too, while
/// anything else reads as a decimal point.
fn resolve_single_separator(compact: &str, sep: char) -> String {
    let occurrences = compact.matches(sep).count();
    let tail_len = compact
        .rsplit(sep)
        .next()
        .map_or(0, str::len);

    if occurrences > 1 || tail_len == 3 {
        compact.replace(sep, "")
    } else {
        compact.replace(sep, ".")
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("€1.234,56", Some(1234.56), Some("EUR"))]
    #[case("$9.99", Some(9.99), Some("USD"))]
    #[case("£1,299.00", Some(1299.00), Some("GBP"))]
    #[case("1 234,50 EUR", Some(1234.50), Some("EUR"))]
    #[case("USD 2,500", Some(2500.0), Some("USD"))]
    #[case("¥1200", Some(1200.0), Some("JPY"))]
    #[case("CA$49.95", Some(49.95), Some("CAD"))]
    #[case("1'299.00 CHF", Some(1299.0), Some("CHF"))]
    #[case("€1.234", Some(1234.0), Some("EUR"))]
    #[case("1,5 kg price 2,95", Some(1.5), None)]
    #[case("199,00 zł incl. VAT", Some(199.0), Some("PLN"))]
    fn parses_common_formats(
        #[case] raw: &str,
        #[case] amount: Option<f64>,
        #[case] currency: Option<&str>,
    ) {
        let price = normalize_price(raw);
        assert_eq!(price.amount, amount, "amount for {raw:?}");
        assert_eq!(price.currency.as_deref(), currency, "currency for {raw:?}");
        assert!(!price.quote_only);
    }

    #[rstest]
    #[case("Contact for price")]
    #[case("Please call for price")]
    #[case("POA")]
    #[case("Request a quote")]
    fn quote_only_maps_to_null_amount(#[case] raw: &str) {
        let price = normalize_price(raw);
        assert!(price.quote_only, "{raw:?} should be quote-only");
        assert_eq!(price.amount, None);
    }

    #[test]
    fn garbage_yields_unset_amount() {
        let price = normalize_price("ask in store");
        assert_eq!(price.amount, None);
        assert!(!price.quote_only);
        assert_eq!(price.currency, None);
    }

    #[test]
    fn deterministic() {
        assert_eq!(normalize_price("€1.234,56"), normalize_price("€1.234,56"));
    }
}
