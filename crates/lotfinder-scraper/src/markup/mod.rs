//! Search-result page parsing.
//!
//! A page is run through an ordered cascade of stages (structured cards,
//! loose anchors, embedded JSON); the first stage that yields anything wins.
//! On page 1 a dense anchor sweep then tops up sparse results.

mod cards;
mod dense;
mod embedded;
pub mod selectors;

use lotfinder_core::{Listing, ListingSet, Platform};
use scraper::Html;

pub use cards::{first_srcset_candidate, is_usable_image, listing_from_card, RawCard};
use embedded::sanitize;

type Stage = fn(&Html, &ParseContext<'_>) -> Vec<Listing>;

const STAGES: [(&str, Stage); 3] = [
    ("cards", cards::parse_cards),
    ("anchors", cards::parse_loose_anchors),
    ("embedded", embedded::parse_embedded),
];

/// Stages allowed to run when every listing must carry an MOQ.
const MOQ_STAGES: [(&str, Stage); 2] = [
    ("cards", cards::parse_cards),
    ("embedded", embedded::parse_embedded),
];

/// Everything a stage needs to know about the page it is parsing.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub platform: Platform,
    /// 1-based page number; the dense sweep only runs on page 1.
    pub page: u32,
    /// How many previously unseen listings the caller still wants.
    pub capacity: usize,
    /// Listings already collected from earlier pages or strategies.
    pub seen: Option<&'a ListingSet>,
    pub require_moq: bool,
}

impl<'a> ParseContext<'a> {
    #[must_use]
    pub fn new(platform: Platform, page: u32, capacity: usize) -> Self {
        Self {
            platform,
            page,
            capacity,
            seen: None,
            require_moq: false,
        }
    }

    #[must_use]
    pub fn with_seen(mut self, seen: &'a ListingSet) -> Self {
        self.seen = Some(seen);
        self
    }

    #[must_use]
    pub fn with_require_moq(mut self, require_moq: bool) -> Self {
        self.require_moq = require_moq;
        self
    }

    #[must_use]
    pub fn is_seen(&self, url: &str) -> bool {
        self.seen.is_some_and(|s| s.contains(url))
    }
}

/// Per-stage accumulator: merges duplicates and counts only unseen URLs
/// against the capacity.
pub(crate) struct Collector<'c, 'a> {
    ctx: &'c ParseContext<'a>,
    set: ListingSet,
    fresh: usize,
}

impl<'c, 'a> Collector<'c, 'a> {
    fn new(ctx: &'c ParseContext<'a>) -> Self {
        Self {
            ctx,
            set: ListingSet::new(),
            fresh: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.fresh >= self.ctx.capacity
    }

    fn push(&mut self, listing: Listing) {
        if self.ctx.require_moq && listing.moq.trim().is_empty() {
            return;
        }
        let unseen = !self.ctx.is_seen(&listing.url);
        if self.set.insert(listing) && unseen {
            self.fresh += 1;
        }
    }

    fn finish(self) -> Vec<Listing> {
        self.set.into_vec()
    }
}

/// Parses one search-results page into listings with canonical URLs.
///
/// Results are deduplicated within the page but not against `ctx.seen`
/// (except for the dense sweep), so callers can merge repeat sightings.
#[must_use]
pub fn parse_listings(html: &str, ctx: &ParseContext<'_>) -> Vec<Listing> {
    if ctx.capacity == 0 {
        return Vec::new();
    }
    let doc = Html::parse_document(html);
    let stages: &[(&str, Stage)] = if ctx.require_moq {
        &MOQ_STAGES
    } else {
        &STAGES
    };

    let mut found = ListingSet::new();
    for (name, stage) in stages {
        let listings = stage(&doc, ctx);
        if !listings.is_empty() {
            tracing::debug!(
                platform = %ctx.platform,
                page = ctx.page,
                stage = *name,
                count = listings.len(),
                "parser stage matched"
            );
            found.extend(listings);
            break;
        }
    }

    if ctx.page == 1 && !ctx.require_moq {
        let fresh = found.urls().filter(|u| !ctx.is_seen(u)).count();
        let remaining = ctx.capacity.saturating_sub(fresh);
        if remaining > 0 {
            let extra = dense::harvest(&doc, ctx, &found, remaining);
            if !extra.is_empty() {
                tracing::debug!(
                    platform = %ctx.platform,
                    count = extra.len(),
                    "dense harvest topped up page"
                );
                found.extend(extra);
            }
        }
    }

    found.into_vec()
}

/// Parses an alternate-endpoint body that may be HTML, JSON, or JSONP.
#[must_use]
pub fn parse_export_body(body: &str, ctx: &ParseContext<'_>) -> Vec<Listing> {
    let trimmed = body.trim_start_matches('\u{feff}').trim();
    if trimmed.starts_with('<') {
        return parse_listings(trimmed, ctx);
    }
    let json = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        trimmed
    } else {
        // JSONP: callback({...});
        match (trimmed.find('('), trimmed.rfind(')')) {
            (Some(open), Some(close)) if close > open => &trimmed[open + 1..close],
            _ => return Vec::new(),
        }
    };
    match serde_json::from_str::<serde_json::Value>(&sanitize(json)) {
        Ok(value) => embedded::listings_from_value(&value, ctx),
        Err(e) => {
            tracing::debug!(platform = %ctx.platform, error = %e, "export body is not JSON");
            Vec::new()
        }
    }
}

#[cfg(test)]
#[path = "markup_test.rs"]
mod tests;
