//! Post-hoc listing quality filter.
//!
//! Runs last in the pipeline, after image upgrades had their chance to add
//! metadata to a listing.

use lotfinder_core::Listing;

use crate::canonical::looks_like_detail_url;

/// Shortest title accepted for a listing that has nothing but a title and a URL.
///
/// The dense harvest enforces it at extraction time; here a shorter title is
/// only rescued by a detail-shaped URL.
pub const MIN_TITLE_CHARS: usize = 4;

/// Returns `true` when `listing` is worth handing back to the caller.
///
/// A listing with price, MOQ, store name or image always passes. Without any
/// of those it must point at a detail-shaped URL and carry a non-blank title,
/// whatever the title's length.
#[must_use]
pub fn passes_quality(listing: &Listing) -> bool {
    if listing.has_metadata() {
        return true;
    }
    let title_chars = listing.title.trim().chars().count();
    let detail = looks_like_detail_url(&listing.url);
    if title_chars < MIN_TITLE_CHARS && !detail {
        return false;
    }
    title_chars > 0 && detail
}

/// Drops every listing that fails [`passes_quality`], preserving order.
#[must_use]
pub fn apply_quality_filter(listings: Vec<Listing>) -> Vec<Listing> {
    let before = listings.len();
    let kept: Vec<Listing> = listings.into_iter().filter(passes_quality).collect();
    if kept.len() < before {
        tracing::debug!(dropped = before - kept.len(), "quality filter dropped listings");
    }
    kept
}

#[cfg(test)]
mod tests {
    use lotfinder_core::Platform;

    use super::*;

    const DETAIL: &str = "https://www.alibaba.com/product-detail/Mug_1600.html";
    const SEARCH: &str = "https://www.alibaba.com/trade/search?SearchText=mug";

    #[test]
    fn short_bare_title_depends_on_url_shape() {
        assert!(!passes_quality(&Listing::new(Platform::Alibaba, "Mug", SEARCH)));
        assert!(passes_quality(&Listing::new(Platform::Alibaba, "Mug", DETAIL)));
    }

    #[test]
    fn bare_listing_off_a_detail_url_is_dropped_even_with_long_title() {
        let listing = Listing::new(Platform::Alibaba, "Ceramic Coffee Mug Supplier", SEARCH);
        assert!(!passes_quality(&listing));
    }

    #[test]
    fn any_metadata_rescues_a_listing() {
        let mut listing = Listing::new(Platform::Alibaba, "Mug", SEARCH);
        listing.store_name = Some("Chaozhou Ceramics".to_owned());
        assert!(passes_quality(&listing));

        let mut listing = Listing::new(Platform::Alibaba, "Mug", SEARCH);
        listing.image = "https://s.alicdn.com/kf/Hmug.jpg".to_owned();
        assert!(passes_quality(&listing));
    }

    #[test]
    fn blank_title_without_metadata_is_dropped() {
        assert!(!passes_quality(&Listing::new(Platform::Alibaba, "  ", DETAIL)));
    }

    #[test]
    fn filter_preserves_order() {
        let listings = vec![
            Listing::new(Platform::Alibaba, "Mug", SEARCH),
            Listing::new(Platform::Alibaba, "Ceramic Mug", DETAIL),
            Listing::new(
                Platform::Alibaba,
                "Glass Mug",
                "https://www.alibaba.com/product-detail/Glass_2.html",
            ),
        ];
        let kept = apply_quality_filter(listings);
        let titles: Vec<&str> = kept.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Ceramic Mug", "Glass Mug"]);
    }
}
