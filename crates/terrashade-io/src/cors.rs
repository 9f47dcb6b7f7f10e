//! Cross-origin request policy
//!
//! A CORS mode is only requested for URLs outside the page origin. `data:`
//! URIs never need one.

use reqwest::Url;
use terrashade_core::CrossOrigin;

/// Whether `src` resolves to an origin other than `page_origin`.
///
/// Relative sources resolve against the page. Without a page origin every
/// absolute `http(s)` URL counts as cross-origin.
pub fn is_cross_origin(src: &str, page_origin: Option<&str>) -> bool {
    if src.trim_start().to_ascii_lowercase().starts_with("data:") {
        return false;
    }

    let page = page_origin.and_then(|origin| Url::parse(origin).ok());
    let target = match &page {
        Some(page) => page.join(src).ok(),
        None => Url::parse(src).ok(),
    };

    match (target, page) {
        (Some(target), Some(page)) => target.origin() != page.origin(),
        (Some(target), None) => matches!(target.scheme(), "http" | "https"),
        (None, _) => false,
    }
}

/// The CORS mode to request `src` with, if any
pub fn cors_mode(
    src: &str,
    cross_origin: Option<CrossOrigin>,
    page_origin: Option<&str>,
) -> Option<CrossOrigin> {
    cross_origin.filter(|_| is_cross_origin(src, page_origin))
}
