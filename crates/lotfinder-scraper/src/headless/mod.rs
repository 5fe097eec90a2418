//! Headless render driver: scroll-and-harvest against a live browser page.
//!
//! The driver is written against [`RenderedPage`], so the round loop, the
//! challenge wait and the mobile fallback are all exercised in tests without
//! a browser. The chromiumoxide session lives in [`chrome`].

#[cfg(feature = "browser")]
pub(crate) mod chrome;
#[cfg(feature = "browser")]
mod stealth;

use std::future::Future;
use std::time::Duration;

use lotfinder_core::{AppConfig, Listing, ListingSet, Platform};
use tokio::time::Instant;

use crate::block::is_blocked;
use crate::error::ScraperError;
use crate::fetcher::{PageFetcher, RenderRequest, RenderedPage, DESKTOP_USER_AGENTS};
use crate::markup::selectors::HarvestPlan;
use crate::markup::listing_from_card;

/// Longest wait for a challenge to clear after a navigation.
pub const CHALLENGE_WAIT: Duration = Duration::from_secs(8);
pub const CHALLENGE_POLL: Duration = Duration::from_millis(250);
/// A page with at least this many links is treated as real content.
pub const MIN_CLEARANCE_ANCHORS: usize = 12;
/// Consecutive rounds without a new URL before scrolling is abandoned.
pub const IDLE_ROUND_LIMIT: u32 = 3;

#[derive(Debug, Clone)]
pub struct HeadlessSettings {
    pub max_rounds: u32,
    /// Pause after each scroll so lazy content can load.
    pub settle: Duration,
    pub challenge_wait: Duration,
    pub challenge_poll: Duration,
    pub require_moq: bool,
}

impl HeadlessSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_rounds: config.headless_max_rounds,
            settle: Duration::from_millis(config.headless_settle_ms),
            challenge_wait: CHALLENGE_WAIT,
            challenge_poll: CHALLENGE_POLL,
            require_moq: config.require_moq,
        }
    }
}

impl Default for HeadlessSettings {
    fn default() -> Self {
        Self {
            max_rounds: 8,
            settle: Duration::from_millis(1200),
            challenge_wait: CHALLENGE_WAIT,
            challenge_poll: CHALLENGE_POLL,
            require_moq: false,
        }
    }
}

pub struct HeadlessDriver<'a> {
    fetcher: &'a dyn PageFetcher,
    settings: HeadlessSettings,
    budget: Option<Duration>,
}

impl<'a> HeadlessDriver<'a> {
    #[must_use]
    pub fn new(fetcher: &'a dyn PageFetcher, settings: HeadlessSettings) -> Self {
        Self {
            fetcher,
            settings,
            budget: None,
        }
    }

    /// Caps the wall-clock time of one [`run`](Self::run). Running out while
    /// opening the page is a [`ScraperError::Timeout`]; running out during the
    /// harvest rounds keeps what earlier rounds found.
    #[must_use]
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Renders the search page in a fresh browser and harvests up to `limit`
    /// listings, deduplicated by canonical URL.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Capability`] when no browser is available.
    /// - [`ScraperError::Blocked`] when both the desktop and mobile entry
    ///   points still show a challenge after the wait.
    /// - [`ScraperError::Timeout`] when the budget runs out before the first
    ///   harvest round.
    /// - Browser errors raised before the first harvest round.
    pub async fn run(
        &self,
        platform: Platform,
        query: &str,
        limit: usize,
        cookie: Option<&str>,
    ) -> Result<Vec<Listing>, ScraperError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let req = RenderRequest {
            platform,
            user_agent: DESKTOP_USER_AGENTS[0].to_owned(),
            cookie: cookie.map(str::to_owned),
        };
        let deadline = self.budget.map(|budget| Instant::now() + budget);
        let mut page = self.bounded(deadline, self.fetcher.fetch_rendered(&req)).await?;
        let result = self
            .drive(page.as_mut(), platform, query, limit, deadline)
            .await;
        page.close().await;
        result
    }

    /// Runs `fut` until `deadline`, turning expiry into [`ScraperError::Timeout`].
    async fn bounded<T, F>(&self, deadline: Option<Instant>, fut: F) -> Result<T, ScraperError>
    where
        F: Future<Output = Result<T, ScraperError>>,
    {
        let Some(deadline) = deadline else {
            return fut.await;
        };
        tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| ScraperError::Timeout {
                stage: "headless render",
                secs: self.budget.map_or(0, |b| b.as_secs()),
            })?
    }

    async fn drive(
        &self,
        page: &mut dyn RenderedPage,
        platform: Platform,
        query: &str,
        limit: usize,
        deadline: Option<Instant>,
    ) -> Result<Vec<Listing>, ScraperError> {
        self.bounded(deadline, self.enter(page, platform, query)).await?;

        let plan = HarvestPlan::default();
        let mut found = ListingSet::new();
        let mut idle_rounds = 0u32;

        for round in 1..=self.settings.max_rounds {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                tracing::warn!(%platform, round, kept = found.len(), "render budget exhausted, keeping results so far");
                break;
            }
            let cards = match self.bounded(deadline, page.harvest_cards(&plan)).await {
                Ok(cards) => cards,
                Err(e) => {
                    tracing::warn!(%platform, round, error = %e, "harvest round failed, keeping results so far");
                    break;
                }
            };
            let require_moq = self.settings.require_moq;
            let added = found.extend(
                cards
                    .iter()
                    .filter_map(|card| listing_from_card(card, platform))
                    .filter(|l| !require_moq || !l.moq.trim().is_empty()),
            );
            tracing::debug!(%platform, round, added, total = found.len(), "headless round");

            if found.len() >= limit {
                break;
            }
            if added == 0 {
                idle_rounds += 1;
                if idle_rounds >= IDLE_ROUND_LIMIT {
                    tracing::debug!(%platform, round, "no new listings for several rounds, stopping");
                    break;
                }
            } else {
                idle_rounds = 0;
            }
            if round < self.settings.max_rounds {
                if let Err(e) = self.bounded(deadline, page.scroll_to_bottom()).await {
                    tracing::warn!(%platform, round, error = %e, "scroll failed, keeping results so far");
                    break;
                }
                tokio::time::sleep(self.settings.settle).await;
            }
        }

        let mut listings = found.into_vec();
        listings.truncate(limit);
        Ok(listings)
    }

    /// Opens the desktop entry, falling back to the mobile one when the
    /// desktop page still shows a challenge.
    async fn enter(
        &self,
        page: &mut dyn RenderedPage,
        platform: Platform,
        query: &str,
    ) -> Result<(), ScraperError> {
        let desktop = platform.desktop_search_url(query, 1);
        self.open(page, platform, &desktop).await?;
        if is_blocked(&page.content().await?, platform) {
            tracing::warn!(%platform, "challenge persisted on desktop entry, trying mobile entry");
            let mobile = platform.mobile_search_url(query, 1);
            self.open(page, platform, &mobile).await?;
            if is_blocked(&page.content().await?, platform) {
                return Err(ScraperError::Blocked { url: mobile });
            }
        }
        Ok(())
    }

    async fn open(
        &self,
        page: &mut dyn RenderedPage,
        platform: Platform,
        url: &str,
    ) -> Result<(), ScraperError> {
        page.navigate(url).await?;
        if !self.wait_for_clearance(page, platform).await {
            tracing::debug!(%platform, url, "clearance signal not seen before timeout");
        }
        Ok(())
    }

    /// Polls until the anti-bot cookie shows up or the page has enough links.
    async fn wait_for_clearance(&self, page: &mut dyn RenderedPage, platform: Platform) -> bool {
        let deadline = Instant::now() + self.settings.challenge_wait;
        loop {
            let cookie_set = page
                .has_cookie(platform.anti_bot_cookie())
                .await
                .unwrap_or(false);
            if cookie_set || page.anchor_count().await.unwrap_or(0) >= MIN_CLEARANCE_ANCHORS {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.settings.challenge_poll).await;
        }
    }
}

/// Splits a `name=value; name2=value2` cookie header into pairs.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) fn split_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_owned(), value.trim().to_owned()))
        })
        .collect()
}

#[cfg(test)]
#[path = "headless_test.rs"]
mod tests;
