//! Static fetch driver: paged plain-HTTP search with a mobile fallback.
//!
//! Pages are requested strictly one after another with a jittered pause in
//! between. For each page the desktop endpoint is tried first; the mobile
//! endpoint is only requested when the desktop variant added nothing new.

use std::time::Duration;

use lotfinder_core::{AppConfig, Listing, ListingSet, Platform};
use rand::Rng;
use serde::Serialize;
use tokio::time::Instant;

use crate::block::is_blocked;
use crate::fetcher::{desktop_user_agent, PageFetcher, StaticRequest, MOBILE_USER_AGENT};
use crate::markup::{parse_listings, ParseContext};

/// Consecutive pages without a new listing before the run gives up.
pub const EMPTY_STREAK_LIMIT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Desktop,
    Mobile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum AttemptStatus {
    /// Parsed; `added` previously unknown URLs.
    Parsed { added: usize },
    /// Login wall or challenge; the body was discarded.
    Blocked,
    /// The request failed after retries.
    Failed,
    /// The run's time budget ran out while this request was in flight.
    TimedOut,
}

/// One request made by the static driver.
#[derive(Debug, Clone, Serialize)]
pub struct FetchAttempt {
    pub page: u32,
    pub variant: Variant,
    #[serde(flatten)]
    pub status: AttemptStatus,
}

#[derive(Debug, Default)]
pub struct StaticOutcome {
    pub listings: Vec<Listing>,
    pub attempts: Vec<FetchAttempt>,
    /// The budget ran out before the run finished; `listings` is partial.
    pub timed_out: bool,
}

impl StaticOutcome {
    /// Number of requests that came back as a challenge page.
    #[must_use]
    pub fn blocked_attempts(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.status == AttemptStatus::Blocked)
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct StaticSettings {
    pub max_pages: u32,
    /// Base pause between requests; up to half of it again is added as jitter.
    pub page_delay_ms: u64,
    pub require_moq: bool,
}

impl StaticSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_pages: config.max_pages,
            page_delay_ms: config.page_delay_ms,
            require_moq: config.require_moq,
        }
    }
}

pub struct StaticDriver<'a> {
    fetcher: &'a dyn PageFetcher,
    settings: StaticSettings,
    budget: Option<Duration>,
}

impl<'a> StaticDriver<'a> {
    #[must_use]
    pub fn new(fetcher: &'a dyn PageFetcher, settings: StaticSettings) -> Self {
        Self {
            fetcher,
            settings,
            budget: None,
        }
    }

    /// Caps the wall-clock time of one [`run`](Self::run). When it runs out
    /// the in-flight request is abandoned and the pages collected so far are
    /// returned.
    #[must_use]
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Collects up to `limit` listings for `query`.
    ///
    /// Never fails: a request error or a challenge page only costs that
    /// request, and shows up in [`StaticOutcome::attempts`].
    pub async fn run(
        &self,
        platform: Platform,
        query: &str,
        limit: usize,
        cookie: Option<&str>,
    ) -> StaticOutcome {
        let mut found = ListingSet::new();
        let mut attempts = Vec::new();
        let mut empty_streak = 0u32;
        let mut first_request = true;
        let mut timed_out = false;
        let deadline = self.budget.map(|budget| Instant::now() + budget);

        'pages: for page in 1..=self.settings.max_pages {
            let variants = [
                (
                    Variant::Desktop,
                    platform.desktop_search_url(query, page),
                    desktop_user_agent(page),
                ),
                (
                    Variant::Mobile,
                    platform.mobile_search_url(query, page),
                    MOBILE_USER_AGENT,
                ),
            ];

            let mut added_on_page = 0usize;
            for (variant, url, user_agent) in variants {
                if found.len() >= limit {
                    break 'pages;
                }
                if added_on_page > 0 {
                    break;
                }
                if !first_request {
                    self.pace().await;
                }
                first_request = false;
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    timed_out = true;
                    break 'pages;
                }

                let req = StaticRequest::for_platform(platform, url, user_agent).with_cookie(cookie);
                let status = self
                    .attempt(platform, page, &req, &mut found, limit, deadline)
                    .await;
                if let AttemptStatus::Parsed { added } = status {
                    added_on_page += added;
                }
                attempts.push(FetchAttempt {
                    page,
                    variant,
                    status,
                });
                if status == AttemptStatus::TimedOut {
                    timed_out = true;
                    break 'pages;
                }
            }

            tracing::debug!(%platform, page, added = added_on_page, total = found.len(), "static page done");
            if found.len() >= limit {
                break;
            }
            if added_on_page == 0 {
                empty_streak += 1;
                if empty_streak >= EMPTY_STREAK_LIMIT {
                    tracing::debug!(%platform, page, "empty streak, stopping static run");
                    break;
                }
            } else {
                empty_streak = 0;
            }
        }

        if timed_out {
            tracing::warn!(%platform, kept = found.len(), "static budget exhausted, keeping pages collected so far");
        }
        let mut listings = found.into_vec();
        listings.truncate(limit);
        StaticOutcome {
            listings,
            attempts,
            timed_out,
        }
    }

    async fn attempt(
        &self,
        platform: Platform,
        page: u32,
        req: &StaticRequest,
        found: &mut ListingSet,
        limit: usize,
        deadline: Option<Instant>,
    ) -> AttemptStatus {
        let fetch = self.fetcher.fetch_static(req);
        let result = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, fetch).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(%platform, page, url = %req.url, "static request outlived the budget");
                    return AttemptStatus::TimedOut;
                }
            },
            None => fetch.await,
        };
        let body = match result {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(%platform, page, url = %req.url, error = %e, "static request failed");
                return AttemptStatus::Failed;
            }
        };
        if is_blocked(&body, platform) {
            tracing::warn!(%platform, page, url = %req.url, "challenge page served, discarding body");
            return AttemptStatus::Blocked;
        }

        let ctx = ParseContext::new(platform, page, limit.saturating_sub(found.len()))
            .with_seen(found)
            .with_require_moq(self.settings.require_moq);
        let listings = parse_listings(&body, &ctx);
        AttemptStatus::Parsed {
            added: found.extend(listings),
        }
    }

    async fn pace(&self) {
        let base = self.settings.page_delay_ms;
        if base == 0 {
            return;
        }
        let jitter = rand::rng().random_range(0..=base / 2);
        tokio::time::sleep(Duration::from_millis(base + jitter)).await;
    }
}

#[cfg(test)]
#[path = "static_driver_test.rs"]
mod tests;
