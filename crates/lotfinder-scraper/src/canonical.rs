//! Listing URL canonicalization and URL-shape heuristics.
//!
//! The canonical URL is the de-duplication key for every listing, so
//! [`canonicalize_url`] must be idempotent and must never fail.

use std::sync::LazyLock;

use lotfinder_core::Platform;
use regex::Regex;
use reqwest::Url;

/// Query keys that identify the item itself on tracking-heavy hosts.
const KEPT_QUERY_KEYS: [&str; 5] = ["id", "offerId", "productId", "itemId", "keywords"];

/// Case-insensitive path shape of a detail page, shared with the in-page harvest script.
pub const DETAIL_PATH_PATTERN: &str = r"/(product-detail|products?|offer|item|detail|prod|goods)[/_.\-]";

static DETAIL_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("(?i){DETAIL_PATH_PATTERN}")).expect("valid regex"));
static DETAIL_QUERY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[?&](offerId|productId|itemId)=\w").expect("valid regex")
});
static SELLER_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(company|supplier|seller|shop|store|showroom)[/_.\-]")
        .expect("valid regex")
});

/// Normalizes `raw` into an absolute, tracking-free URL.
///
/// - protocol-relative (`//host/path`) inputs get `https:`
/// - relative inputs are joined onto `base`
/// - on tracking-heavy hosts only the item-identifying query keys survive and
///   the fragment is dropped
/// - an empty query never leaves a dangling `?`
///
/// Anything that cannot be parsed comes back unchanged.
#[must_use]
pub fn canonicalize_url(raw: &str, base: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return raw.to_owned();
    }

    let candidate = if trimmed.starts_with("//") {
        format!("https:{trimmed}")
    } else {
        trimmed.to_owned()
    };

    let parsed =
        Url::parse(&candidate).or_else(|_| Url::parse(base).and_then(|b| b.join(&candidate)));
    let Ok(mut url) = parsed else {
        return raw.to_owned();
    };
    if !matches!(url.scheme(), "http" | "https") {
        return raw.to_owned();
    }

    if url.host_str().is_some_and(is_tracking_heavy_host) {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| KEPT_QUERY_KEYS.iter().any(|key| key.eq_ignore_ascii_case(k)))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
        url.set_fragment(None);
    }

    if url.query() == Some("") {
        url.set_query(None);
    }
    if url.fragment() == Some("") {
        url.set_fragment(None);
    }

    url.to_string()
}

/// Convenience wrapper resolving against the platform's own origin.
#[must_use]
pub fn canonicalize_for(platform: Platform, raw: &str) -> String {
    canonicalize_url(raw, platform.base_url())
}

/// Makes an asset URL absolute without touching its query string.
///
/// Returns `None` for data URIs, non-http schemes, and anything unparseable.
#[must_use]
pub fn absolutize(raw: &str, base: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with("data:") {
        return None;
    }
    let candidate = if trimmed.starts_with("//") {
        format!("https:{trimmed}")
    } else {
        trimmed.to_owned()
    };
    let url = Url::parse(&candidate)
        .or_else(|_| Url::parse(base).and_then(|b| b.join(&candidate)))
        .ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

fn is_tracking_heavy_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    Platform::tracking_heavy_hosts()
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{h}")))
}

/// `true` when the URL path looks like a product/offer detail page.
#[must_use]
pub fn looks_like_detail_url(url: &str) -> bool {
    DETAIL_PATH_RE.is_match(url) || DETAIL_QUERY_RE.is_match(url)
}

/// Broader shape used by the dense harvest: detail pages plus seller storefronts.
#[must_use]
pub fn looks_like_listing_or_seller_url(url: &str) -> bool {
    looks_like_detail_url(url) || SELLER_PATH_RE.is_match(url)
}
