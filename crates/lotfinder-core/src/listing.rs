use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::Platform;

/// One product listing recovered from a source marketplace.
///
/// `url` is the canonical absolute URL and doubles as the identity key: two
/// listings with the same `url` are the same entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub platform: Platform,
    pub title: String,
    /// Remote image URL or a local cache path. Empty when unknown.
    pub image: String,
    pub url: String,
    /// Display price exactly as the site showed it, e.g. `"US$ 1.20-3.50"`.
    pub price: String,
    /// ISO 4217 code, when the price carried a recognizable currency.
    pub currency: Option<String>,
    /// Normalized `"MOQ N"` form, or empty when the site did not say.
    pub moq: String,
    pub store_name: Option<String>,
    pub description: Option<String>,
}

impl Listing {
    /// Creates a listing with only the identity fields populated.
    #[must_use]
    pub fn new(platform: Platform, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            platform,
            title: title.into(),
            image: String::new(),
            url: url.into(),
            price: String::new(),
            currency: None,
            moq: String::new(),
            store_name: None,
            description: None,
        }
    }

    /// `true` when any of price, MOQ, store name, or image is present.
    #[must_use]
    pub fn has_metadata(&self) -> bool {
        !self.price.trim().is_empty()
            || !self.moq.trim().is_empty()
            || !self.image.trim().is_empty()
            || self
                .store_name
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty())
    }

    /// Fills every empty field of `self` from `other`.
    ///
    /// Fields already populated on `self` are kept, so the first sighting
    /// wins whenever both sightings carry a value.
    pub fn absorb(&mut self, other: Listing) {
        fill_string(&mut self.title, other.title);
        fill_string(&mut self.image, other.image);
        fill_string(&mut self.price, other.price);
        fill_string(&mut self.moq, other.moq);
        fill_option(&mut self.currency, other.currency);
        fill_option(&mut self.store_name, other.store_name);
        fill_option(&mut self.description, other.description);
    }
}

fn fill_string(slot: &mut String, candidate: String) {
    if slot.trim().is_empty() && !candidate.trim().is_empty() {
        *slot = candidate;
    }
}

fn fill_option(slot: &mut Option<String>, candidate: Option<String>) {
    let slot_empty = slot.as_deref().is_none_or(|s| s.trim().is_empty());
    let candidate_present = candidate.as_deref().is_some_and(|s| !s.trim().is_empty());
    if slot_empty && candidate_present {
        *slot = candidate;
    }
}

/// Insertion-ordered listings keyed by canonical URL.
///
/// Inserting a URL that is already present merges the new sighting into the
/// existing record instead of adding a second one.
#[derive(Debug, Clone, Default)]
pub struct ListingSet {
    items: Vec<Listing>,
    index: HashMap<String, usize>,
}

impl ListingSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or merges `listing`. Returns `true` when its URL was new.
    pub fn insert(&mut self, listing: Listing) -> bool {
        if let Some(&pos) = self.index.get(&listing.url) {
            self.items[pos].absorb(listing);
            false
        } else {
            self.index.insert(listing.url.clone(), self.items.len());
            self.items.push(listing);
            true
        }
    }

    /// Inserts every listing, returning how many URLs were new.
    pub fn extend<I>(&mut self, listings: I) -> usize
    where
        I: IntoIterator<Item = Listing>,
    {
        listings
            .into_iter()
            .map(|l| self.insert(l))
            .filter(|added| *added)
            .count()
    }

    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(url)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Canonical URLs currently held, in insertion order.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|l| l.url.as_str())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Listing] {
        &self.items
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Listing> {
        self.items
    }
}

impl FromIterator<Listing> for ListingSet {
    fn from_iter<T: IntoIterator<Item = Listing>>(iter: T) -> Self {
        let mut set = ListingSet::new();
        set.extend(iter);
        set
    }
}
