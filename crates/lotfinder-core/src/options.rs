use serde::{Deserialize, Serialize};

/// Per-call switches for one orchestrated fetch.
///
/// `upgrade_images` and `cache_images` are independent: caching without an
/// upgrade still caches whatever image the listing already had.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Allow the headless render driver as a fallback for sparse static results.
    #[serde(default)]
    pub headless: bool,
    /// Skip the static driver and go straight to headless rendering.
    #[serde(default)]
    pub force_headless: bool,
    /// Visit detail pages to recover images for listings that have none.
    #[serde(default)]
    pub upgrade_images: bool,
    /// Replace remote image URLs with locally cached copies.
    #[serde(default)]
    pub cache_images: bool,
    /// Log per-strategy counts at `info` level.
    #[serde(default)]
    pub debug: bool,
}

impl FetchOptions {
    /// `true` when the headless driver may run at all.
    #[must_use]
    pub fn headless_allowed(&self) -> bool {
        self.headless || self.force_headless
    }
}
