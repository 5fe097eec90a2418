use super::*;

const CARDS_PAGE: &str = r#"
<html><body>
  <div class="product-item-list">
    <div class="search-card-item">
      <a href="//www.alibaba.com/product-detail/LED-Strip_1600001.html?spm=a2700.7724857">
        <img src="//s.alicdn.com/@img/imgextra/loading.gif"
             data-src="//s.alicdn.com/kf/Hled1.jpg_300x300.jpg">
      </a>
      <h2 class="search-card-e-title">
        <a href="//www.alibaba.com/product-detail/LED-Strip_1600001.html?spm=a2700.7724857">5050 RGB LED Strip Light</a>
      </h2>
      <div class="search-card-e-price-main">US$0.80-1.20</div>
      <div class="search-card-m-sale-features__item">Min. order: 100 meters</div>
      <a class="company-name" href="//shenzhen-led.en.alibaba.com/company_profile.html">Shenzhen LED Co., Ltd.</a>
    </div>
    <div class="search-card-item">
      <a title="COB Flexible Strip 24V" href="/product-detail/COB-Strip_1600002.html">
        <img srcset="//s.alicdn.com/kf/Hcob.jpg_220x220.jpg 1x, //s.alicdn.com/kf/Hcob.jpg 2x">
      </a>
      <div class="price">US$ 2.10</div>
      <div class="moq">≥ 50 rolls</div>
    </div>
  </div>
  <footer><a href="/product-detail/Z_9.html">Go</a></footer>
</body></html>
"#;

fn urls(listings: &[Listing]) -> Vec<&str> {
    listings.iter().map(|l| l.url.as_str()).collect()
}

#[test]
fn cards_stage_reads_every_field() {
    let ctx = ParseContext::new(Platform::Alibaba, 2, 10);
    let listings = parse_listings(CARDS_PAGE, &ctx);

    assert_eq!(
        urls(&listings),
        vec![
            "https://www.alibaba.com/product-detail/LED-Strip_1600001.html",
            "https://www.alibaba.com/product-detail/COB-Strip_1600002.html",
        ]
    );

    let led = &listings[0];
    assert_eq!(led.title, "5050 RGB LED Strip Light");
    assert_eq!(led.price, "US$0.80-1.20");
    assert_eq!(led.currency.as_deref(), Some("USD"));
    assert_eq!(led.moq, "MOQ 100");
    assert_eq!(led.image, "https://s.alicdn.com/kf/Hled1.jpg_300x300.jpg");
    assert_eq!(led.store_name.as_deref(), Some("Shenzhen LED Co., Ltd."));

    let cob = &listings[1];
    assert_eq!(cob.title, "COB Flexible Strip 24V");
    assert_eq!(cob.price, "US$ 2.10");
    assert_eq!(cob.moq, "MOQ 50");
    assert_eq!(cob.image, "https://s.alicdn.com/kf/Hcob.jpg_220x220.jpg");
}

#[test]
fn capacity_stops_the_stage_early() {
    let ctx = ParseContext::new(Platform::Alibaba, 2, 1);
    assert_eq!(parse_listings(CARDS_PAGE, &ctx).len(), 1);
}

#[test]
fn zero_capacity_parses_nothing() {
    let ctx = ParseContext::new(Platform::Alibaba, 1, 0);
    assert!(parse_listings(CARDS_PAGE, &ctx).is_empty());
}

#[test]
fn dense_harvest_tops_up_first_page_only() {
    let first = parse_listings(CARDS_PAGE, &ParseContext::new(Platform::Alibaba, 1, 10));
    assert_eq!(first.len(), 3, "{:?}", urls(&first));
    let seller = &first[2];
    assert_eq!(
        seller.url,
        "https://shenzhen-led.en.alibaba.com/company_profile.html"
    );
    assert_eq!(seller.title, "Shenzhen LED Co., Ltd.");
    assert!(!seller.has_metadata());
    // "Go" is below the dense title minimum.
    assert!(!urls(&first).contains(&"https://www.alibaba.com/product-detail/Z_9.html"));

    let second = parse_listings(CARDS_PAGE, &ParseContext::new(Platform::Alibaba, 2, 10));
    assert_eq!(second.len(), 2);
}

#[test]
fn dense_harvest_skips_seen_urls_but_cards_still_report_them() {
    let seen: ListingSet = [
        Listing::new(
            Platform::Alibaba,
            "seller",
            "https://shenzhen-led.en.alibaba.com/company_profile.html",
        ),
        Listing::new(
            Platform::Alibaba,
            "led",
            "https://www.alibaba.com/product-detail/LED-Strip_1600001.html",
        ),
    ]
    .into_iter()
    .collect();
    let ctx = ParseContext::new(Platform::Alibaba, 1, 10).with_seen(&seen);
    let listings = parse_listings(CARDS_PAGE, &ctx);
    assert_eq!(
        urls(&listings),
        vec![
            "https://www.alibaba.com/product-detail/LED-Strip_1600001.html",
            "https://www.alibaba.com/product-detail/COB-Strip_1600002.html",
        ]
    );
}

#[test]
fn loose_anchors_used_when_no_cards_match() {
    let html = r#"<ul>
        <li><a href="https://detail.1688.com/offer/6001.html?spm=a26352">不锈钢保温杯 500ml</a></li>
        <li><a href="https://s.1688.com/selloffer/offer_search.htm?beginPage=2">下一页</a></li>
        <li><a href="https://detail.1688.com/offer/6002.html"> </a></li>
    </ul>"#;
    let listings = parse_listings(html, &ParseContext::new(Platform::Alibaba1688, 2, 10));
    assert_eq!(urls(&listings), vec!["https://detail.1688.com/offer/6001.html"]);
    assert_eq!(listings[0].title, "不锈钢保温杯 500ml");
    assert!(listings[0].price.is_empty());
    assert!(listings[0].moq.is_empty());
}

#[test]
fn embedded_json_used_when_markup_is_empty() {
    let html = r#"<html><head>
        <script>var broken = {"price": 1, "title": ;</script>
        <script>
          window.runParams = {"resultList": [
            {"productUrl": "/product-detail/Glass-Bottle_7.html?spm=1", "title": "Glass Bottle 250ml",
             "price": "US$ 0.45", "moq": "500 Pieces", "imageUrl": "//s.alicdn.com/kf/Hbottle.jpg"},
            {"productUrl": "/trade/search", "title": "not a product", "price": "US$ 1"},
          ]};
        </script>
    </head><body><div id="root"></div></body></html>"#;
    let listings = parse_listings(html, &ParseContext::new(Platform::Alibaba, 2, 10));
    assert_eq!(listings.len(), 1);
    let bottle = &listings[0];
    assert_eq!(
        bottle.url,
        "https://www.alibaba.com/product-detail/Glass-Bottle_7.html"
    );
    assert_eq!(bottle.price, "US$ 0.45");
    assert_eq!(bottle.moq, "MOQ 500");
    assert_eq!(bottle.image, "https://s.alicdn.com/kf/Hbottle.jpg");
}

#[test]
fn require_moq_drops_moq_less_cards_and_skips_loose_stages() {
    let ctx = ParseContext::new(Platform::Alibaba, 1, 10).with_require_moq(true);
    let listings = parse_listings(CARDS_PAGE, &ctx);
    assert_eq!(listings.len(), 2, "seller link must not be harvested");
    assert!(listings.iter().all(|l| !l.moq.is_empty()));

    let anchors_only = r#"<a href="/product-detail/Mug_1.html">Ceramic Mug</a>"#;
    assert!(parse_listings(anchors_only, &ctx).is_empty());
}

#[test]
fn garbage_input_yields_nothing() {
    let ctx = ParseContext::new(Platform::Yiwugo, 1, 10);
    assert!(parse_listings("", &ctx).is_empty());
    assert!(parse_listings("<<<>>> not html {{", &ctx).is_empty());
}

#[test]
fn export_body_accepts_jsonp() {
    let body = r#"jsonp_cb({"data":{"offerList":[
        {"offerUrl":"https://detail.1688.com/offer/55.html?spm=x","subject":"折叠伞 自动",
         "priceText":"¥9.90","quantityBegin":"3"}
    ]}});"#;
    let listings = parse_export_body(body, &ParseContext::new(Platform::Alibaba1688, 1, 10));
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].url, "https://detail.1688.com/offer/55.html");
    assert_eq!(listings[0].currency.as_deref(), Some("CNY"));
    assert_eq!(listings[0].moq, "MOQ 3");
}

#[test]
fn export_body_falls_back_to_html_parsing() {
    let ctx = ParseContext::new(Platform::Alibaba, 2, 10);
    assert_eq!(parse_export_body(CARDS_PAGE, &ctx).len(), 2);
    assert!(parse_export_body("not json at all", &ctx).is_empty());
}
