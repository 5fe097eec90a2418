use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::*;
use crate::error::ScraperError;
use crate::fetcher::DESKTOP_USER_AGENTS;

/// Serves canned bodies by exact URL; unknown URLs get an empty page.
#[derive(Default)]
struct CannedFetcher {
    bodies: HashMap<String, String>,
    failing: Vec<String>,
    stalled: Vec<String>,
    requests: Mutex<Vec<(String, String)>>,
}

impl CannedFetcher {
    fn body(mut self, url: String, body: String) -> Self {
        self.bodies.insert(url, body);
        self
    }

    fn failing(mut self, url: String) -> Self {
        self.failing.push(url);
        self
    }

    /// Requests for `url` never answer in test time.
    fn stalled(mut self, url: String) -> Self {
        self.stalled.push(url);
        self
    }

    fn requested(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for CannedFetcher {
    async fn fetch_static(&self, req: &StaticRequest) -> Result<String, ScraperError> {
        self.requests
            .lock()
            .unwrap()
            .push((req.url.clone(), req.user_agent.clone()));
        if self.stalled.contains(&req.url) {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        if self.failing.contains(&req.url) {
            return Err(ScraperError::UnexpectedStatus {
                status: 503,
                url: req.url.clone(),
            });
        }
        Ok(self.bodies.get(&req.url).cloned().unwrap_or_default())
    }
}

fn cards(ids: &[u32]) -> String {
    let cards: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="pro-item"><a href="/product/{id}.html">Plastic Storage Box {id}</a>
                   <span class="price">￥{id}.50</span><span>起批量 {id}0 件</span></div>"#
            )
        })
        .collect();
    format!("<html><body><div class='list'>{cards}</div></body></html>")
}

fn settings(max_pages: u32) -> StaticSettings {
    StaticSettings {
        max_pages,
        page_delay_ms: 0,
        require_moq: false,
    }
}

const P: Platform = Platform::Yiwugo;

#[tokio::test]
async fn pages_are_walked_in_order_with_rotating_user_agents() {
    let fetcher = CannedFetcher::default()
        .body(P.desktop_search_url("box", 1), cards(&[1, 2]))
        .body(P.desktop_search_url("box", 2), cards(&[3]))
        .body(P.desktop_search_url("box", 3), cards(&[4]));
    let driver = StaticDriver::new(&fetcher, settings(3));

    let outcome = driver.run(P, "box", 10, None).await;

    assert_eq!(outcome.listings.len(), 4);
    let requested = fetcher.requested();
    assert_eq!(requested.len(), 3, "mobile skipped when desktop adds listings");
    for (i, (url, agent)) in requested.iter().enumerate() {
        let page = u32::try_from(i).unwrap() + 1;
        assert_eq!(url, &P.desktop_search_url("box", page));
        assert_eq!(agent, DESKTOP_USER_AGENTS[i]);
    }
    let first = &outcome.listings[0];
    assert_eq!(first.url, "https://en.yiwugo.com/product/1.html");
    assert_eq!(first.price, "￥1.50");
    assert_eq!(first.currency.as_deref(), Some("CNY"));
    assert_eq!(first.moq, "MOQ 10");
}

#[tokio::test]
async fn two_empty_pages_end_the_run() {
    let fetcher = CannedFetcher::default();
    let driver = StaticDriver::new(&fetcher, settings(10));

    let outcome = driver.run(P, "box", 10, None).await;

    assert!(outcome.listings.is_empty());
    // Desktop and mobile for pages 1 and 2 only.
    assert_eq!(fetcher.requested().len(), 4);
    assert_eq!(outcome.attempts.len(), 4);
}

#[tokio::test]
async fn failed_or_blocked_desktop_falls_through_to_mobile() {
    let fetcher = CannedFetcher::default()
        .failing(P.desktop_search_url("box", 1))
        .body(P.mobile_search_url("box", 1), cards(&[1]))
        .body(
            P.desktop_search_url("box", 2),
            "<p>访问验证</p>".to_owned() + &cards(&[9]),
        )
        .body(P.mobile_search_url("box", 2), cards(&[2]));
    let driver = StaticDriver::new(&fetcher, settings(2));

    let outcome = driver.run(P, "box", 10, None).await;

    let urls: Vec<&str> = outcome.listings.iter().map(|l| l.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://en.yiwugo.com/product/1.html",
            "https://en.yiwugo.com/product/2.html",
        ]
    );
    let statuses: Vec<AttemptStatus> = outcome.attempts.iter().map(|a| a.status).collect();
    assert_eq!(
        statuses,
        vec![
            AttemptStatus::Failed,
            AttemptStatus::Parsed { added: 1 },
            AttemptStatus::Blocked,
            AttemptStatus::Parsed { added: 1 },
        ]
    );
    assert_eq!(outcome.blocked_attempts(), 1);
    let mobile_agent = &fetcher.requested()[1].1;
    assert_eq!(mobile_agent, MOBILE_USER_AGENT);
}

#[tokio::test]
async fn limit_stops_paging_and_truncates() {
    let fetcher = CannedFetcher::default()
        .body(P.desktop_search_url("box", 1), cards(&[1, 2, 3]))
        .body(P.desktop_search_url("box", 2), cards(&[4, 5, 6]));
    let driver = StaticDriver::new(&fetcher, settings(5));

    let outcome = driver.run(P, "box", 2, None).await;

    assert_eq!(outcome.listings.len(), 2);
    assert_eq!(fetcher.requested().len(), 1);
}

#[tokio::test]
async fn overlapping_pages_do_not_duplicate() {
    let fetcher = CannedFetcher::default()
        .body(P.desktop_search_url("box", 1), cards(&[1, 2]))
        .body(P.desktop_search_url("box", 2), cards(&[2, 3]));
    let driver = StaticDriver::new(&fetcher, settings(2));

    let outcome = driver.run(P, "box", 10, None).await;

    let urls: Vec<&str> = outcome.listings.iter().map(|l| l.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://en.yiwugo.com/product/1.html",
            "https://en.yiwugo.com/product/2.html",
            "https://en.yiwugo.com/product/3.html",
        ]
    );
}

#[tokio::test]
async fn exhausted_budget_keeps_pages_already_collected() {
    let fetcher = CannedFetcher::default()
        .body(P.desktop_search_url("box", 1), cards(&[1, 2, 3]))
        .stalled(P.desktop_search_url("box", 2))
        .stalled(P.mobile_search_url("box", 2));
    let driver = StaticDriver::new(&fetcher, settings(3)).with_budget(Duration::from_millis(300));

    let started = std::time::Instant::now();
    let outcome = driver.run(P, "box", 10, None).await;

    assert!(started.elapsed() < Duration::from_secs(2), "stalled page was waited out");
    assert!(outcome.timed_out);
    assert_eq!(outcome.listings.len(), 3);
    let statuses: Vec<AttemptStatus> = outcome.attempts.iter().map(|a| a.status).collect();
    assert_eq!(
        statuses,
        vec![AttemptStatus::Parsed { added: 3 }, AttemptStatus::TimedOut]
    );
}

#[tokio::test]
async fn run_without_budget_is_not_marked_timed_out() {
    let fetcher = CannedFetcher::default().body(P.desktop_search_url("box", 1), cards(&[1]));
    let driver = StaticDriver::new(&fetcher, settings(1));

    let outcome = driver.run(P, "box", 10, None).await;

    assert!(!outcome.timed_out);
    assert_eq!(outcome.listings.len(), 1);
}
