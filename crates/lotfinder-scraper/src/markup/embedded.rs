//! Listings recovered from JSON blobs that sites inline into `<script>` tags.
//!
//! Search pages on the wholesale marketplaces frequently ship their first
//! page of results as a state object (`window.__INIT_DATA__ = {...}`,
//! `runParams = {...}`, JSON-LD). Fragments are located by bracket balancing,
//! lightly sanitized, and walked recursively for product-shaped objects.

use std::sync::LazyLock;

use lotfinder_core::{Listing, Platform};
use regex::Regex;
use scraper::Html;
use serde_json::{Map, Value};

use super::cards::is_usable_image;
use super::selectors::SCRIPT_SEL;
use super::{Collector, ParseContext};
use crate::canonical::{absolutize, canonicalize_for, looks_like_detail_url};
use crate::extract::{collapse_whitespace, extract_moq, find_price};

static PRODUCT_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"(price|pricetext|moq|minorder\w*|quantitybegin|offerid|productid|product\w*|offers?)"\s*:"#)
        .expect("valid regex")
});
static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("valid regex"));

const URL_KEYS: [&str; 8] = [
    "detailUrl", "productUrl", "offerUrl", "itemUrl", "detail_url", "url", "link", "href",
];
const TITLE_KEYS: [&str; 6] = ["title", "subject", "name", "productName", "offerTitle", "simpleSubject"];
const PRICE_KEYS: [&str; 7] = [
    "price", "priceText", "displayPrice", "localPrice", "offerPrice", "priceRange", "promotionPrice",
];
const CURRENCY_KEYS: [&str; 3] = ["currency", "currencyCode", "priceCurrency"];
const MOQ_KEYS: [&str; 6] = ["moq", "minOrder", "minOrderQuantity", "quantityBegin", "moqText", "minimumOrder"];
const IMAGE_KEYS: [&str; 8] = [
    "image", "imageUrl", "imgUrl", "mainImage", "picUrl", "offerPicUrl", "img", "images",
];
const STORE_KEYS: [&str; 6] = ["companyName", "supplierName", "storeName", "shopName", "sellerName", "company"];

/// Nesting deeper than this is not a listing payload.
const MAX_DEPTH: usize = 24;

/// Listings from inline script JSON.
pub(super) fn parse_embedded(doc: &Html, ctx: &ParseContext<'_>) -> Vec<Listing> {
    let mut out = Collector::new(ctx);
    for script in doc.select(&SCRIPT_SEL) {
        if out.is_full() {
            break;
        }
        let body: String = script.text().collect();
        if !PRODUCT_KEY_RE.is_match(&body) {
            continue;
        }
        for fragment in json_fragments(&body) {
            let Ok(value) = serde_json::from_str::<Value>(&sanitize(fragment)) else {
                continue;
            };
            walk(&value, ctx.platform, 0, &mut out);
            if out.is_full() {
                break;
            }
        }
    }
    out.finish()
}

/// Walks an already-parsed JSON document (export endpoints, JSONP bodies).
pub(super) fn listings_from_value(value: &Value, ctx: &ParseContext<'_>) -> Vec<Listing> {
    let mut out = Collector::new(ctx);
    walk(value, ctx.platform, 0, &mut out);
    out.finish()
}

fn walk(value: &Value, platform: Platform, depth: usize, out: &mut Collector<'_, '_>) {
    if depth > MAX_DEPTH || out.is_full() {
        return;
    }
    match value {
        Value::Object(map) => {
            if let Some(listing) = listing_from_object(map, platform) {
                out.push(listing);
                return;
            }
            for child in map.values() {
                walk(child, platform, depth + 1, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                walk(child, platform, depth + 1, out);
            }
        }
        _ => {}
    }
}

fn listing_from_object(map: &Map<String, Value>, platform: Platform) -> Option<Listing> {
    let href = first_string(map, &URL_KEYS)?;
    let url = canonicalize_for(platform, &href);
    if !url.starts_with("http") || !looks_like_detail_url(&url) {
        return None;
    }
    let title = first_string(map, &TITLE_KEYS)
        .map(|t| collapse_whitespace(&t))
        .filter(|t| !t.is_empty())?;

    let mut listing = Listing::new(platform, title, url);

    // JSON-LD nests price data under `offers`.
    let offers = map.get("offers").map(|o| match o {
        Value::Array(items) => items.first().unwrap_or(o),
        _ => o,
    });
    let offer_map = offers.and_then(Value::as_object);

    let raw_price = first_scalar(map, &PRICE_KEYS)
        .or_else(|| offer_map.and_then(|m| first_scalar(m, &PRICE_KEYS)));
    let currency = first_string(map, &CURRENCY_KEYS)
        .or_else(|| offer_map.and_then(|m| first_string(m, &CURRENCY_KEYS)));
    if let Some(raw) = raw_price {
        if let Some((price, code)) = find_price(&raw) {
            listing.price = price;
            listing.currency = Some(code.to_owned());
        } else if raw.chars().any(|c| c.is_ascii_digit()) {
            listing.price = raw;
            listing.currency = currency.map(|c| c.trim().to_ascii_uppercase());
        }
    }

    listing.moq = first_scalar(map, &MOQ_KEYS)
        .and_then(|raw| {
            if raw.trim().chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.') {
                extract_moq(&format!("MOQ {raw}"))
            } else {
                extract_moq(&raw)
            }
        })
        .unwrap_or_default();

    listing.image = image_value(map)
        .and_then(|raw| absolutize(&raw, platform.base_url()))
        .filter(|u| is_usable_image(u))
        .unwrap_or_default();

    listing.store_name = STORE_KEYS.iter().find_map(|key| match map.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(collapse_whitespace(s)),
        Value::Object(inner) => first_string(inner, &["name"]),
        _ => None,
    });

    Some(listing)
}

fn first_string(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        map.get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    })
}

/// Strings as-is, numbers rendered.
fn first_scalar(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn image_value(map: &Map<String, Value>) -> Option<String> {
    IMAGE_KEYS.iter().find_map(|key| match map.get(*key)? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(inner) => first_string(inner, &["url", "src", "imageUrl"]),
            _ => None,
        }),
        Value::Object(inner) => first_string(inner, &["url", "src", "imageUrl"]),
        _ => None,
    })
}

/// Removes trailing commas before a closing bracket.
pub(crate) fn sanitize(fragment: &str) -> String {
    TRAILING_COMMA_RE.replace_all(fragment, "$1").into_owned()
}

/// Balanced `{...}` / `[...]` fragments that start a script, or follow `=` or `(`.
pub(crate) fn json_fragments(script: &str) -> Vec<&str> {
    let bytes = script.as_bytes();
    let mut fragments = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if (b == b'{' || b == b'[') && opener_allowed(bytes, i) {
            if let Some(end) = balanced_end(bytes, i) {
                fragments.push(&script[i..=end]);
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }
    fragments
}

fn opener_allowed(bytes: &[u8], pos: usize) -> bool {
    let prev = bytes[..pos]
        .iter()
        .rev()
        .find(|b| !b.is_ascii_whitespace())
        .copied();
    matches!(prev, None | Some(b'=' | b'(' | b';'))
}

/// Index of the bracket closing the one at `start`, honoring JSON strings.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}
