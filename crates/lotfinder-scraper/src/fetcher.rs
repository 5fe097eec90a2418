//! The page-fetching capability the pipeline is written against.
//!
//! [`PageFetcher`] has two faces: plain HTTP fetches that return a body, and
//! rendered sessions that hand back a live [`RenderedPage`]. Production code
//! uses [`HttpFetcher`]; tests substitute in-memory fakes.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use lotfinder_core::{AppConfig, Platform};
use reqwest::Client;

use crate::error::ScraperError;
use crate::markup::selectors::HarvestPlan;
use crate::markup::RawCard;
use crate::rate_limit::retry_with_backoff;

/// Desktop browser user agents rotated per result page.
pub const DESKTOP_USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
];

/// User agent sent with mobile search endpoint requests.
pub const MOBILE_USER_AGENT: &str =
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";

/// User agent for the given 1-based page number.
#[must_use]
pub fn desktop_user_agent(page: u32) -> &'static str {
    let idx = usize::try_from(page.saturating_sub(1)).unwrap_or(0) % DESKTOP_USER_AGENTS.len();
    DESKTOP_USER_AGENTS[idx]
}

/// One plain HTTP GET with the headers a browser would send.
#[derive(Debug, Clone)]
pub struct StaticRequest {
    pub url: String,
    pub user_agent: String,
    pub accept_language: String,
    pub referer: String,
    /// Opaque `name=value; name2=value2` cookie header.
    pub cookie: Option<String>,
}

impl StaticRequest {
    /// Request for `url` dressed up for `platform`.
    #[must_use]
    pub fn for_platform(platform: Platform, url: impl Into<String>, user_agent: &str) -> Self {
        Self {
            url: url.into(),
            user_agent: user_agent.to_owned(),
            accept_language: platform.accept_language().to_owned(),
            referer: platform.referer().to_owned(),
            cookie: None,
        }
    }

    #[must_use]
    pub fn with_cookie(mut self, cookie: Option<&str>) -> Self {
        self.cookie = cookie.map(str::to_owned);
        self
    }
}

/// Parameters for one isolated rendered browsing session.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub platform: Platform,
    pub user_agent: String,
    pub cookie: Option<String>,
}

/// A live page inside an isolated browser context.
///
/// Every session owns its own browser; nothing is shared across queries.
#[async_trait]
pub trait RenderedPage: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), ScraperError>;

    /// `true` once a cookie called `name` is present for the current page.
    async fn has_cookie(&mut self, name: &str) -> Result<bool, ScraperError>;

    /// Number of `<a href>` elements currently in the DOM.
    async fn anchor_count(&mut self) -> Result<usize, ScraperError>;

    /// Serialized current DOM.
    async fn content(&mut self) -> Result<String, ScraperError>;

    /// Runs the in-page card harvest for `plan` against the live DOM.
    async fn harvest_cards(&mut self, plan: &HarvestPlan) -> Result<Vec<RawCard>, ScraperError>;

    async fn scroll_to_bottom(&mut self) -> Result<(), ScraperError>;

    /// Tears the session down. Errors are logged, never returned.
    async fn close(&mut self);
}

/// Fetching capability injected into every driver.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `req.url` and returns the body of a 2xx response.
    async fn fetch_static(&self, req: &StaticRequest) -> Result<String, ScraperError>;

    /// Opens a rendered session. Fetchers without a browser report
    /// [`ScraperError::Capability`].
    async fn fetch_rendered(
        &self,
        _req: &RenderRequest,
    ) -> Result<Box<dyn RenderedPage>, ScraperError> {
        Err(ScraperError::Capability(
            "headless rendering is not available in this build".to_owned(),
        ))
    }
}

/// reqwest-backed fetcher; launches Chrome for rendered sessions when the
/// `browser` feature is enabled.
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    backoff_base_ms: u64,
    #[cfg_attr(not(feature = "browser"), allow(dead_code))]
    timeout_secs: u64,
    #[cfg_attr(not(feature = "browser"), allow(dead_code))]
    chrome_path: Option<PathBuf>,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(timeout_secs: u64, max_retries: u32, backoff_base_ms: u64) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(DESKTOP_USER_AGENTS[0])
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_ms,
            timeout_secs,
            chrome_path: None,
        })
    }

    /// Builds a fetcher from the request and retry settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the `reqwest::Client` cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, ScraperError> {
        Ok(Self::new(
            config.request_timeout_secs,
            config.max_retries,
            config.retry_backoff_base_ms,
        )?
        .with_chrome_path(config.chrome_path.clone()))
    }

    #[must_use]
    pub fn with_chrome_path(mut self, chrome_path: Option<PathBuf>) -> Self {
        self.chrome_path = chrome_path;
        self
    }

    async fn get_once(&self, req: &StaticRequest) -> Result<String, ScraperError> {
        let mut request = self
            .client
            .get(&req.url)
            .header(reqwest::header::USER_AGENT, &req.user_agent)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, &req.accept_language)
            .header(reqwest::header::REFERER, &req.referer)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .header(reqwest::header::PRAGMA, "no-cache");
        if let Some(cookie) = req.cookie.as_deref().filter(|c| !c.trim().is_empty()) {
            request = request.header(reqwest::header::COOKIE, cookie);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            let domain = response.url().host_str().unwrap_or_default().to_owned();
            return Err(ScraperError::RateLimited {
                domain,
                retry_after_secs,
            });
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ScraperError::NotFound {
                url: req.url.clone(),
            });
        }
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: req.url.clone(),
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_static(&self, req: &StaticRequest) -> Result<String, ScraperError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || self.get_once(req)).await
    }

    #[cfg(feature = "browser")]
    async fn fetch_rendered(
        &self,
        req: &RenderRequest,
    ) -> Result<Box<dyn RenderedPage>, ScraperError> {
        let page =
            crate::headless::chrome::ChromePage::launch(req, self.chrome_path.as_deref(), self.timeout_secs)
                .await?;
        Ok(Box::new(page))
    }
}
