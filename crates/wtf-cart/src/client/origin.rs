//! Store origin parsing for the cart client.

use reqwest::Url;

use crate::error::CartError;

/// Reduces a configured store URL to its scheme+host origin.
///
/// `"https://shop.example.com/collections/kava"` becomes
/// `"https://shop.example.com/"`, so cart endpoints always resolve against
/// the store root.
///
/// # Errors
///
/// Returns [`CartError::InvalidStoreUrl`] if the URL does not parse, is not
/// `http`/`https`, or has no host.
pub fn store_origin(store_url: &str) -> Result<Url, CartError> {
    let invalid = |reason: String| CartError::InvalidStoreUrl {
        store_url: store_url.to_owned(),
        reason,
    };

    let url = Url::parse(store_url.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme \"{}\"", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_owned()));
    }

    let origin = url.origin().ascii_serialization();
    Url::parse(&origin).map_err(|e| invalid(format!("origin \"{origin}\" is not a valid base: {e}")))
}

/// Hostname of a store URL for log fields. Falls back to the input.
pub(super) fn extract_domain(store_url: &str) -> String {
    Url::parse(store_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| store_url.to_owned())
}
