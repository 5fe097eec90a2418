use std::collections::HashSet;
use std::sync::LazyLock;

use lotfinder_core::{Listing, Platform};
use regex::Regex;
use scraper::{ElementRef, Html};
use serde::Deserialize;

use super::selectors::{ANCHOR_SEL, CARD_SEL, HEADING_SEL, IMAGE_ATTRS, IMAGE_SEL, STORE_SEL};
use super::{Collector, ParseContext};
use crate::canonical::{absolutize, canonicalize_for, looks_like_detail_url};
use crate::extract::{collapse_whitespace, extract_moq, find_price};

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|[^a-z])(placeholder|sprite|logo|default|icon|blank|loading|lazy[-_]?load|pixel|spacer|transparent)s?(?:[^a-z]|$)",
    )
    .expect("valid regex")
});
static NON_PHOTO_EXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(svg|gif)(\?|#|$)").expect("valid regex"));

/// Store labels longer than this are layout noise, not a name.
const MAX_STORE_CHARS: usize = 120;

/// One product card as seen by either the static parser or the live-DOM harvest.
///
/// Field names match what the in-page harvest script emits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawCard {
    pub href: String,
    pub anchor_title: String,
    pub anchor_text: String,
    pub heading_text: String,
    pub image_candidates: Vec<String>,
    pub card_text: String,
    pub container_text: String,
    pub store_text: String,
}

/// Turns a raw card into a listing.
///
/// Returns `None` when the href is not detail-shaped or no title survives.
#[must_use]
pub fn listing_from_card(card: &RawCard, platform: Platform) -> Option<Listing> {
    let url = canonicalize_for(platform, &card.href);
    if !url.starts_with("http") || !looks_like_detail_url(&url) {
        return None;
    }

    let title = [&card.anchor_title, &card.anchor_text, &card.heading_text]
        .into_iter()
        .map(|t| collapse_whitespace(t))
        .find(|t| !t.is_empty())?;

    let mut listing = Listing::new(platform, title, url);

    listing.image = card
        .image_candidates
        .iter()
        .filter_map(|c| absolutize(c, platform.base_url()))
        .find(|c| is_usable_image(c))
        .unwrap_or_default();

    // The card's own text wins; the container only fills what the card lacks.
    let own = collapse_whitespace(&card.card_text);
    let container = collapse_whitespace(&card.container_text);
    if let Some((price, code)) = find_price(&own).or_else(|| find_price(&container)) {
        listing.price = price;
        listing.currency = Some(code.to_owned());
    }
    listing.moq = extract_moq(&own)
        .or_else(|| extract_moq(&container))
        .unwrap_or_default();

    let store = collapse_whitespace(&card.store_text);
    if !store.is_empty() && store.chars().count() <= MAX_STORE_CHARS {
        listing.store_name = Some(store);
    }

    Some(listing)
}

/// `true` when `url` plausibly points at a product photo.
#[must_use]
pub fn is_usable_image(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() || url.starts_with("data:") {
        return false;
    }
    let file = url
        .split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .unwrap_or(url);
    !PLACEHOLDER_RE.is_match(file) && !NON_PHOTO_EXT_RE.is_match(url)
}

/// First URL of a `srcset` attribute.
#[must_use]
pub fn first_srcset_candidate(srcset: &str) -> Option<&str> {
    srcset
        .split(',')
        .filter_map(|entry| entry.split_whitespace().next())
        .find(|url| !url.is_empty())
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

fn image_candidates(scope: ElementRef<'_>) -> Vec<String> {
    let mut out = Vec::new();
    for img in scope.select(&IMAGE_SEL) {
        let attrs = img.value();
        for name in IMAGE_ATTRS {
            if let Some(v) = attrs.attr(name) {
                out.push(v.to_owned());
            }
        }
        for name in ["srcset", "data-srcset"] {
            if let Some(first) = attrs.attr(name).and_then(first_srcset_candidate) {
                out.push(first.to_owned());
            }
        }
    }
    out
}

/// Reads one card container. `None` for wrappers holding several products.
fn raw_card(card: ElementRef<'_>, platform: Platform) -> Option<RawCard> {
    let own_anchor = (card.value().name() == "a" && card.value().attr("href").is_some())
        .then_some(card);
    let anchors: Vec<ElementRef<'_>> = own_anchor
        .into_iter()
        .chain(card.select(&ANCHOR_SEL))
        .filter(|a| {
            a.value()
                .attr("href")
                .is_some_and(|h| looks_like_detail_url(&canonicalize_for(platform, h)))
        })
        .collect();

    let distinct: HashSet<String> = anchors
        .iter()
        .filter_map(|a| a.value().attr("href"))
        .map(|h| canonicalize_for(platform, h))
        .collect();
    if distinct.len() != 1 {
        return None;
    }

    // Prefer an anchor that carries text over an image-only link.
    let primary = anchors
        .iter()
        .copied()
        .find(|a| !element_text(*a).is_empty() || a.value().attr("title").is_some())
        .or_else(|| anchors.first().copied())?;

    let heading_text = card
        .select(&HEADING_SEL)
        .map(element_text)
        .find(|t| !t.is_empty())
        .unwrap_or_default();
    let store_text = card
        .select(&STORE_SEL)
        .map(element_text)
        .find(|t| !t.is_empty())
        .unwrap_or_default();
    let container_text = card
        .parent()
        .and_then(ElementRef::wrap)
        .map(element_text)
        .unwrap_or_default();

    Some(RawCard {
        href: primary.value().attr("href").unwrap_or_default().to_owned(),
        anchor_title: primary.value().attr("title").unwrap_or_default().to_owned(),
        anchor_text: element_text(primary),
        heading_text,
        image_candidates: image_candidates(card),
        card_text: element_text(card),
        container_text,
        store_text,
    })
}

/// Structured product cards.
pub(super) fn parse_cards(doc: &Html, ctx: &ParseContext<'_>) -> Vec<Listing> {
    let mut out = Collector::new(ctx);
    for card in doc.select(&CARD_SEL) {
        if out.is_full() {
            break;
        }
        let Some(raw) = raw_card(card, ctx.platform) else {
            continue;
        };
        if let Some(listing) = listing_from_card(&raw, ctx.platform) {
            out.push(listing);
        }
    }
    out.finish()
}

/// Any detail-shaped anchor with visible text or a title.
pub(super) fn parse_loose_anchors(doc: &Html, ctx: &ParseContext<'_>) -> Vec<Listing> {
    let mut out = Collector::new(ctx);
    for anchor in doc.select(&ANCHOR_SEL) {
        if out.is_full() {
            break;
        }
        let raw = RawCard {
            href: anchor.value().attr("href").unwrap_or_default().to_owned(),
            anchor_title: anchor.value().attr("title").unwrap_or_default().to_owned(),
            anchor_text: element_text(anchor),
            ..RawCard::default()
        };
        if let Some(listing) = listing_from_card(&raw, ctx.platform) {
            out.push(listing);
        }
    }
    out.finish()
}
