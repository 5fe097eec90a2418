use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::*;

const DETAIL: &str = "https://www.alibaba.com/product-detail/Mug_1600.html";

#[test]
fn meta_tags_win_over_everything_else() {
    let html = r#"<html><head>
        <meta property="og:image" content="//s.alicdn.com/kf/Hmain.jpg">
        <script>window.detail = {"imageList": ["https://s.alicdn.com/kf/Hscript.jpg"]};</script>
    </head><body><div class="gallery"><img src="/img/Hgallery.jpg"></div></body></html>"#;
    assert_eq!(
        extract_detail_image(html, DETAIL).as_deref(),
        Some("https://s.alicdn.com/kf/Hmain.jpg")
    );
}

#[test]
fn placeholder_meta_image_falls_through_to_script_array() {
    let html = r#"<html><head>
        <meta property="og:image" content="https://s.alicdn.com/logo/site-logo.png">
        <script>var g = {"imageList":["https:\/\/cbu01.alicdn.com\/img\/ibank\/O1CN01.jpg","x"]};</script>
    </head></html>"#;
    assert_eq!(
        extract_detail_image(html, DETAIL).as_deref(),
        Some("https://cbu01.alicdn.com/img/ibank/O1CN01.jpg")
    );
}

#[test]
fn gallery_markup_and_background_images_are_last_resorts() {
    let gallery = r#"<div class="detail-gallery">
        <img src="/images/loading.gif" data-src="/images/p/Hcup_big.jpg">
    </div>"#;
    assert_eq!(
        extract_detail_image(gallery, DETAIL).as_deref(),
        Some("https://www.alibaba.com/images/p/Hcup_big.jpg")
    );

    let background =
        r#"<div class="main-pic" style="background-image: url('//img.yiwugo.com/p/cup.webp')"></div>"#;
    assert_eq!(
        extract_detail_image(background, "https://en.yiwugo.com/product/1.html").as_deref(),
        Some("https://img.yiwugo.com/p/cup.webp")
    );
}

#[test]
fn page_without_photos_yields_none() {
    let html = r#"<html><head><meta name="twitter:image" content="data:image/png;base64,AAAA"></head>
        <body><img src="/sprite.png"></body></html>"#;
    assert_eq!(extract_detail_image(html, DETAIL), None);
}

/// Serves a detail page with an image after a short delay, tracking how many
/// requests overlap.
#[derive(Default)]
struct SlowDetailFetcher {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl PageFetcher for SlowDetailFetcher {
    async fn fetch_static(&self, req: &StaticRequest) -> Result<String, ScraperError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(15)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if req.url.ends_with("_13.html") {
            return Err(ScraperError::UnexpectedStatus {
                status: 502,
                url: req.url.clone(),
            });
        }
        Ok(format!(
            r#"<meta property="og:image" content="https://s.alicdn.com/kf/{}.jpg">"#,
            req.url.rsplit('/').next().unwrap_or_default().trim_end_matches(".html")
        ))
    }
}

fn bare_listings(n: usize) -> Vec<Listing> {
    (0..n)
        .map(|i| {
            Listing::new(
                Platform::Alibaba,
                format!("Ceramic Mug {i}"),
                format!("https://www.alibaba.com/product-detail/Mug_{i}.html"),
            )
        })
        .collect()
}

#[tokio::test]
async fn pool_never_exceeds_configured_concurrency() {
    let fetcher = SlowDetailFetcher::default();
    let mut listings = bare_listings(20);

    let resolved = resolve_missing_images(&fetcher, Platform::Alibaba, &mut listings, 4, None).await;

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 20);
    let max = fetcher.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 4, "saw {max} concurrent detail fetches");
    assert!(max > 1, "pool should actually run requests concurrently");

    // One detail page fails; its listing keeps an empty image.
    assert_eq!(resolved, 19);
    assert!(listings[13].image.is_empty());
    assert_eq!(listings[7].image, "https://s.alicdn.com/kf/Mug_7.jpg");
}

#[tokio::test]
async fn listings_with_images_are_not_revisited() {
    let fetcher = SlowDetailFetcher::default();
    let mut listings = bare_listings(3);
    listings[0].image = "https://s.alicdn.com/kf/already.jpg".to_owned();

    let resolved = resolve_missing_images(&fetcher, Platform::Alibaba, &mut listings, 0, None).await;

    assert_eq!(resolved, 2);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    assert_eq!(listings[0].image, "https://s.alicdn.com/kf/already.jpg");
}

/// Answers every detail page at once except `Mug_2`, which never answers in
/// test time.
struct OneStalledPage;

#[async_trait]
impl PageFetcher for OneStalledPage {
    async fn fetch_static(&self, req: &StaticRequest) -> Result<String, ScraperError> {
        if req.url.ends_with("Mug_2.html") {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        Ok(format!(
            r#"<meta property="og:image" content="https://s.alicdn.com/kf/{}.jpg">"#,
            req.url.rsplit('/').next().unwrap_or_default().trim_end_matches(".html")
        ))
    }
}

#[tokio::test]
async fn cancelled_upgrade_keeps_images_already_resolved() {
    let mut listings = bare_listings(3);

    let upgrade = resolve_missing_images(&OneStalledPage, Platform::Alibaba, &mut listings, 3, None);
    let outcome = tokio::time::timeout(Duration::from_millis(300), upgrade).await;

    assert!(outcome.is_err(), "stalled detail page should exhaust the budget");
    assert_eq!(listings[0].image, "https://s.alicdn.com/kf/Mug_0.jpg");
    assert_eq!(listings[1].image, "https://s.alicdn.com/kf/Mug_1.jpg");
    assert!(listings[2].image.is_empty());
}
