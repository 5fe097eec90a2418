//! Integration tests for `HttpFetcher::fetch_static`.
//!
//! Each test stands up a `wiremock` server, so no real marketplace is
//! contacted. Covered: the browser-like headers every request carries, and
//! how each HTTP failure class is retried or surfaced.

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lotfinder_core::Platform;
use lotfinder_scraper::fetcher::MOBILE_USER_AGENT;
use lotfinder_scraper::{HttpFetcher, PageFetcher, ScraperError, StaticRequest};

fn request(server: &MockServer, route: &str) -> StaticRequest {
    StaticRequest::for_platform(
        Platform::Alibaba1688,
        format!("{}{route}", server.uri()),
        MOBILE_USER_AGENT,
    )
}

#[tokio::test]
async fn sends_platform_headers_and_session_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/offer_search"))
        .and(header("user-agent", MOBILE_USER_AGENT))
        .and(header("referer", "https://www.1688.com/"))
        .and(header("cookie", "cna=abc; x5sec=tok"))
        .and(header("cache-control", "no-cache"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(5, 0, 0).expect("client");
    let req = request(&server, "/offer_search").with_cookie(Some("cna=abc; x5sec=tok"));

    let body = fetcher.fetch_static(&req).await.expect("fetch");
    assert_eq!(body, "<html>ok</html>");
}

#[tokio::test]
async fn blank_cookie_is_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(5, 0, 0).expect("client");
    let req = request(&server, "/search").with_cookie(Some("   "));
    fetcher.fetch_static(&req).await.expect("fetch");

    let received = server.received_requests().await.expect("recording enabled");
    assert_eq!(received.len(), 1);
    assert!(!received[0].headers.contains_key("cookie"));
}

#[tokio::test]
async fn rate_limit_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("page"))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(5, 1, 0).expect("client");
    let body = fetcher
        .fetch_static(&request(&server, "/search"))
        .await
        .expect("second attempt succeeds");
    assert_eq!(body, "page");
}

#[tokio::test]
async fn server_errors_are_retried_until_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(5, 2, 0).expect("client");
    let result = fetcher.fetch_static(&request(&server, "/search")).await;
    assert!(matches!(
        result,
        Err(ScraperError::UnexpectedStatus { status: 503, .. })
    ));
}

#[tokio::test]
async fn client_errors_fail_fast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(5, 3, 0).expect("client");
    assert!(matches!(
        fetcher.fetch_static(&request(&server, "/missing")).await,
        Err(ScraperError::NotFound { .. })
    ));
    assert!(matches!(
        fetcher.fetch_static(&request(&server, "/forbidden")).await,
        Err(ScraperError::UnexpectedStatus { status: 403, .. })
    ));
}
