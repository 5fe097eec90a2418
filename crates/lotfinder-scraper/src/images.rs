//! Detail-page image recovery for listings that came back without a photo.
//!
//! Detail pages are fetched through a bounded pool: at most `concurrency`
//! requests are in flight at any moment, and a failed page simply leaves
//! its listing without an image.

use std::sync::LazyLock;

use futures::stream::{self, StreamExt};
use lotfinder_core::{Listing, Platform};
use regex::Regex;
use scraper::{Html, Selector};

use crate::block::is_blocked;
use crate::canonical::absolutize;
use crate::error::ScraperError;
use crate::fetcher::{desktop_user_agent, PageFetcher, StaticRequest};
use crate::markup::selectors::{IMAGE_ATTRS, SCRIPT_SEL};
use crate::markup::{first_srcset_candidate, is_usable_image};

/// Social-preview tags in priority order, with the attribute holding the URL.
static META_IMAGE_SELS: LazyLock<Vec<(Selector, &'static str)>> = LazyLock::new(|| {
    [
        ("meta[property='og:image']", "content"),
        ("meta[name='og:image']", "content"),
        ("meta[property='og:image:url']", "content"),
        ("meta[name='twitter:image']", "content"),
        ("meta[property='twitter:image']", "content"),
        ("meta[itemprop='image']", "content"),
        ("link[rel='image_src']", "href"),
    ]
    .into_iter()
    .map(|(css, attr)| (Selector::parse(css).expect("valid meta selector"), attr))
    .collect()
});

static GALLERY_IMG_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "[class*='gallery'] img, \
         [class*='main-image'] img, \
         [class*='mainImage'] img, \
         [class*='detail-img'] img, \
         [class*='image-viewer'] img, \
         [class*='preview'] img, \
         [class*='swiper'] img, \
         [class*='slider'] img, \
         [class*='magnifier'] img, \
         [class*='thumb'] img, \
         #J_ImgBooth",
    )
    .expect("valid gallery selector")
});

static BACKGROUND_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[style*='background']").expect("valid background selector")
});

static SCRIPT_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)"(?:image[_-]?list|images|img[_-]?list|image[_-]?urls?|gallery(?:[_-]?images)?|pic[_-]?list|main[_-]?image|big[_-]?image|image[_-]?path)"\s*:\s*(\[[^\]]*\]|"[^"]*")"#,
    )
    .expect("valid regex")
});
static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"\s]+)""#).expect("valid regex"));
static CSS_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).expect("valid regex")
});
static IMAGE_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(jpe?g|png|webp|avif)").expect("valid regex"));

/// Finds the best product photo on a detail page.
///
/// Sources in priority order: social-preview meta tags, image arrays inside
/// inline scripts, then gallery markup including CSS `background-image`.
/// Relative candidates resolve against `page_url`.
#[must_use]
pub fn extract_detail_image(html: &str, page_url: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let usable = |raw: &str| absolutize(raw, page_url).filter(|u| is_usable_image(u));

    let from_meta = META_IMAGE_SELS.iter().find_map(|(sel, attr)| {
        doc.select(sel)
            .filter_map(|el| el.value().attr(attr))
            .find_map(usable)
    });
    if from_meta.is_some() {
        return from_meta;
    }

    let from_scripts = doc.select(&SCRIPT_SEL).find_map(|script| {
        let text = script.text().collect::<String>().replace("\\/", "/");
        SCRIPT_IMAGE_RE
            .captures_iter(&text)
            .filter_map(|caps| caps.get(1))
            .flat_map(|value| QUOTED_RE.captures_iter(value.as_str()))
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|candidate| IMAGE_PATH_RE.is_match(candidate))
            .find_map(usable)
    });
    if from_scripts.is_some() {
        return from_scripts;
    }

    let from_gallery = doc.select(&GALLERY_IMG_SEL).find_map(|img| {
        let attrs = img.value();
        IMAGE_ATTRS
            .iter()
            .filter_map(|name| attrs.attr(name))
            .chain(
                ["srcset", "data-srcset"]
                    .iter()
                    .filter_map(|name| attrs.attr(name))
                    .filter_map(first_srcset_candidate),
            )
            .find_map(usable)
    });
    if from_gallery.is_some() {
        return from_gallery;
    }

    doc.select(&BACKGROUND_SEL).find_map(|el| {
        let style = el.value().attr("style")?;
        CSS_URL_RE
            .captures_iter(style)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| usable(m.as_str()))
    })
}

/// Fetches one detail page and extracts its product image.
///
/// A challenge page counts as "no image", not as an error.
///
/// # Errors
///
/// Returns the fetcher's error when the page cannot be retrieved.
pub async fn resolve_image(
    fetcher: &dyn PageFetcher,
    platform: Platform,
    detail_url: &str,
    cookie: Option<&str>,
) -> Result<Option<String>, ScraperError> {
    let req = StaticRequest::for_platform(platform, detail_url, desktop_user_agent(1))
        .with_cookie(cookie);
    let html = fetcher.fetch_static(&req).await?;
    if is_blocked(&html, platform) {
        tracing::debug!(%platform, url = detail_url, "detail page is a challenge, no image");
        return Ok(None);
    }
    Ok(extract_detail_image(&html, detail_url))
}

/// Fills in `image` for every listing that has none, visiting at most
/// `concurrency` detail pages at a time. Returns how many were recovered.
///
/// Each image is stored as soon as its page resolves; a caller that drops
/// this future early keeps the images already found.
pub async fn resolve_missing_images(
    fetcher: &dyn PageFetcher,
    platform: Platform,
    listings: &mut [Listing],
    concurrency: usize,
    cookie: Option<&str>,
) -> usize {
    let pending: Vec<(usize, String)> = listings
        .iter()
        .enumerate()
        .filter(|(_, l)| l.image.trim().is_empty())
        .map(|(idx, l)| (idx, l.url.clone()))
        .collect();
    if pending.is_empty() {
        return 0;
    }

    let mut results = stream::iter(pending)
        .map(|(idx, url)| async move {
            match resolve_image(fetcher, platform, &url, cookie).await {
                Ok(image) => (idx, image),
                Err(e) => {
                    tracing::warn!(%platform, url = %url, error = %e, "detail page fetch failed");
                    (idx, None)
                }
            }
        })
        .buffer_unordered(concurrency.max(1));

    let mut resolved = 0;
    while let Some((idx, image)) = results.next().await {
        if let Some(image) = image {
            listings[idx].image = image;
            resolved += 1;
        }
    }
    tracing::debug!(%platform, resolved, "detail images resolved");
    resolved
}

#[cfg(test)]
#[path = "images_test.rs"]
mod tests;
