use lotfinder_core::{Listing, ListingSet};
use scraper::Html;

use super::selectors::{ANCHOR_SEL, IMAGE_SEL};
use super::ParseContext;
use crate::canonical::{canonicalize_for, looks_like_listing_or_seller_url};
use crate::extract::collapse_whitespace;
use crate::quality::MIN_TITLE_CHARS;

/// Supplemental first-page sweep over every anchor with a product or seller shape.
///
/// Only URLs unknown to both `ctx.seen` and `found` are returned, at most
/// `remaining` of them, all with empty metadata.
pub(super) fn harvest(
    doc: &Html,
    ctx: &ParseContext<'_>,
    found: &ListingSet,
    remaining: usize,
) -> Vec<Listing> {
    let mut out = ListingSet::new();
    for anchor in doc.select(&ANCHOR_SEL) {
        if out.len() >= remaining {
            break;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let url = canonicalize_for(ctx.platform, href);
        if !url.starts_with("http")
            || !looks_like_listing_or_seller_url(&url)
            || ctx.is_seen(&url)
            || found.contains(&url)
            || out.contains(&url)
        {
            continue;
        }

        let text = collapse_whitespace(&anchor.text().collect::<Vec<_>>().join(" "));
        let title = anchor
            .value()
            .attr("title")
            .map(collapse_whitespace)
            .filter(|t| !t.is_empty())
            .or_else(|| (!text.is_empty()).then_some(text))
            .or_else(|| {
                anchor
                    .select(&IMAGE_SEL)
                    .find_map(|img| img.value().attr("alt"))
                    .map(collapse_whitespace)
            })
            .unwrap_or_default();
        if title.chars().count() < MIN_TITLE_CHARS {
            continue;
        }
        out.insert(Listing::new(ctx.platform, title, url));
    }
    out.into_vec()
}
