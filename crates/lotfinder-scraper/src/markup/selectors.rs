//! CSS selectors for search-result markup across all supported marketplaces.
//!
//! The raw selector strings are also shipped to the in-page harvest script,
//! so the static parser and the live-DOM harvest agree on what a card is.
//! When a site reshuffles its markup, capture a sample page, extend the
//! matching list here and add a fixture test in `markup::tests`.

use std::sync::LazyLock;

use scraper::Selector;
use serde::Serialize;

use crate::canonical::DETAIL_PATH_PATTERN;

/// Product card containers.
pub const CARD: &str = "\
    [class*='search-card-item'], \
    [class*='organic-list-offer'], \
    [class*='offer-list-row'] > div, \
    [class*='sm-offer-item'], \
    [class*='offer-item'], \
    [class*='product-item'], \
    [class*='prod-info'], \
    [class*='pro-item'], \
    [class*='goods-item'], \
    [class*='item-card'], \
    [class*='list-node'], \
    [data-offerid], \
    [data-product-id]";

/// Title-bearing elements inside a card.
pub const HEADING: &str = "h2, h3, h4, [class*='title'], [class*='subject']";

/// Supplier/store name labels inside a card.
pub const STORE: &str = "\
    [class*='company-name'], \
    [class*='companyName'], \
    [class*='supplier-name'], \
    [class*='store-name'], \
    [class*='shop-name'], \
    [class*='seller-name']";

pub const ANCHOR: &str = "a[href]";
pub const IMAGE: &str = "img";
pub const SCRIPT: &str = "script";

/// `img` attributes checked for an image URL, in priority order.
pub const IMAGE_ATTRS: [&str; 4] = ["src", "data-src", "data-lazy-src", "data-original"];

pub static CARD_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(CARD).expect("valid card selector"));
pub static HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(HEADING).expect("valid heading selector"));
pub static STORE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(STORE).expect("valid store selector"));
pub static ANCHOR_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(ANCHOR).expect("valid anchor selector"));
pub static IMAGE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(IMAGE).expect("valid image selector"));
pub static SCRIPT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(SCRIPT).expect("valid script selector"));

/// Selector plan handed to the live-DOM harvest script.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestPlan {
    pub card: &'static str,
    pub heading: &'static str,
    pub store: &'static str,
    pub anchor: &'static str,
    pub image: &'static str,
    pub image_attrs: [&'static str; 4],
    pub detail_pattern: &'static str,
}

impl Default for HarvestPlan {
    fn default() -> Self {
        Self {
            card: CARD,
            heading: HEADING,
            store: STORE,
            anchor: ANCHOR,
            image: IMAGE,
            image_attrs: IMAGE_ATTRS,
            detail_pattern: DETAIL_PATH_PATTERN,
        }
    }
}
