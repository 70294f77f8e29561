//! Platform fingerprinting from markup.

pub use crate::domain::Platform;

/// Ordered fingerprint table; the first matching platform wins.
const FINGERPRINTS: &[(Platform, &[&str])] = &[
    (
        Platform::Shopify,
        &["cdn.shopify.com", "Shopify.theme", "shopify-checkout-api-token", "/cdn/shop/"],
    ),
    (
        Platform::WooCommerce,
        &["wp-content/plugins/woocommerce", "woocommerce-page", "class=\"woocommerce"],
    ),
    (
        Platform::Magento,
        &["Magento_Ui", "mage-init", "data-mage-init", "/static/version"],
    ),
    (
        Platform::BigCommerce,
        &["cdn11.bigcommerce.com", "stencil-utils"],
    ),
    (
        Platform::PrestaShop,
        &["prestashop", "/modules/ps_"],
    ),
];

/// Inspects raw markup for platform fingerprints.
#[must_use]
pub fn detect_platform(html: &str) -> Platform {
    for (platform, needles) in FINGERPRINTS {
        if needles.iter().any(|n| html.contains(n)) {
            return *platform;
        }
    }
    Platform::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_shopify() {
        let html = r#"<html><head><script src="https://cdn.shopify.com/s/x.js"></script></head></html>"#;
        assert_eq!(detect_platform(html), Platform::Shopify);
    }

    #[test]
    fn detects_woocommerce() {
        let html = r#"<body class="woocommerce-page"><link href="/wp-content/plugins/woocommerce/a.css"></body>"#;
        assert_eq!(detect_platform(html), Platform::WooCommerce);
    }

    #[test]
    fn unknown_when_no_fingerprint() {
        assert_eq!(detect_platform("<html><body>plain</body></html>"), Platform::Unknown);
    }
}
