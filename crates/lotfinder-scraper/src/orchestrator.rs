//! Fetch strategy orchestration.
//!
//! [`Harvester::fetch_listings`] runs static fetching first, escalates to a
//! headless browser when results are sparse, tries the platform's alternate
//! endpoint when they are still sparse, then post-processes. Every strategy
//! failure degrades to zero results from that strategy; only an unusable
//! query is reported to the caller.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lotfinder_core::{AppConfig, FetchOptions, Listing, ListingSet, Platform};

use crate::block::is_blocked;
use crate::error::ScraperError;
use crate::fetcher::{desktop_user_agent, PageFetcher, StaticRequest};
use crate::headless::{HeadlessDriver, HeadlessSettings};
use crate::image_cache::{cache_listing_images, ImageCache};
use crate::images::resolve_missing_images;
use crate::markup::{parse_export_body, ParseContext};
use crate::metrics::{FetchOutcome, MetricsCollector};
use crate::quality::apply_quality_filter;
use crate::static_driver::{StaticDriver, StaticSettings};

/// Static results below this count (or below the limit, if smaller) are sparse.
pub const SPARSE_RESULT_THRESHOLD: usize = 6;
/// Results below this count (or below the limit, if smaller) trigger the alternate endpoint.
pub const ALTERNATE_RESULT_THRESHOLD: usize = 3;

#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub static_driver: StaticSettings,
    pub headless: HeadlessSettings,
    /// Budget for one whole strategy run, and for the image upgrade pass.
    pub strategy_timeout: Duration,
    pub image_concurrency: usize,
    pub require_moq: bool,
    pub session_cookies: BTreeMap<Platform, String>,
}

impl HarvestSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            static_driver: StaticSettings::from_config(config),
            headless: HeadlessSettings::from_config(config),
            strategy_timeout: Duration::from_secs(config.strategy_timeout_secs),
            image_concurrency: config.image_concurrency,
            require_moq: config.require_moq,
            session_cookies: config.session_cookies.clone(),
        }
    }
}

/// Which strategy a count belongs to, for logging.
#[derive(Debug, Clone, Copy)]
enum Stage {
    Static,
    Headless,
    Alternate,
}

impl Stage {
    fn name(self) -> &'static str {
        match self {
            Stage::Static => "static",
            Stage::Headless => "headless",
            Stage::Alternate => "alternate",
        }
    }
}

pub struct Harvester {
    fetcher: Arc<dyn PageFetcher>,
    metrics: Arc<MetricsCollector>,
    settings: HarvestSettings,
    image_cache: Option<Arc<dyn ImageCache>>,
}

impl Harvester {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        metrics: Arc<MetricsCollector>,
        settings: HarvestSettings,
    ) -> Self {
        Self {
            fetcher,
            metrics,
            settings,
            image_cache: None,
        }
    }

    #[must_use]
    pub fn with_image_cache(mut self, cache: Arc<dyn ImageCache>) -> Self {
        self.image_cache = Some(cache);
        self
    }

    #[must_use]
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Collects up to `limit` listings for `query` on `platform`.
    ///
    /// An empty result is a normal outcome meaning no strategy produced
    /// anything usable.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidQuery`] for a blank query or a zero
    /// limit. No other error escapes.
    pub async fn fetch_listings(
        &self,
        platform: Platform,
        query: &str,
        limit: usize,
        options: &FetchOptions,
    ) -> Result<Vec<Listing>, ScraperError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ScraperError::InvalidQuery("query is empty".to_owned()));
        }
        if limit == 0 {
            return Err(ScraperError::InvalidQuery(
                "limit must be at least 1".to_owned(),
            ));
        }

        let started = Instant::now();
        let cookie = self
            .settings
            .session_cookies
            .get(&platform)
            .map(String::as_str);
        let sparse_threshold = SPARSE_RESULT_THRESHOLD.min(limit);
        let alternate_threshold = ALTERNATE_RESULT_THRESHOLD.min(limit);

        let mut results = Vec::new();
        let mut sparse = false;
        let mut headless_adopted = false;

        if !options.force_headless {
            results = self.run_static(platform, query, limit, cookie).await;
            sparse = results.len() < sparse_threshold;
            log_stage(options, platform, Stage::Static, results.len());
        }

        if options.force_headless || (options.headless && sparse) {
            let rendered = self.run_headless(platform, query, limit, cookie).await;
            log_stage(options, platform, Stage::Headless, rendered.len());
            if rendered.len() > results.len() {
                results = rendered;
                headless_adopted = true;
            }
        }

        if results.len() < alternate_threshold {
            let mut merged: ListingSet = results.into_iter().collect();
            let extra = self
                .run_alternate(platform, query, limit, cookie, &merged)
                .await;
            let mut added = 0;
            for listing in extra {
                if !merged.contains(&listing.url) {
                    merged.insert(listing);
                    added += 1;
                }
            }
            log_stage(options, platform, Stage::Alternate, added);
            results = merged.into_vec();
        }

        if options.upgrade_images {
            self.upgrade_images(platform, &mut results, cookie).await;
        }
        if options.cache_images {
            match &self.image_cache {
                Some(cache) => {
                    cache_listing_images(cache.as_ref(), &mut results).await;
                }
                None => tracing::warn!(%platform, "image caching requested but no cache is configured"),
            }
        }

        let mut results = apply_quality_filter(results);
        results.truncate(limit);

        let duration = started.elapsed();
        self.metrics.record(
            platform,
            FetchOutcome {
                duration,
                headless_adopted,
                sparse,
            },
        );
        tracing::info!(
            %platform,
            query,
            count = results.len(),
            elapsed_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            headless_adopted,
            sparse,
            "fetch finished"
        );
        Ok(results)
    }

    async fn run_static(
        &self,
        platform: Platform,
        query: &str,
        limit: usize,
        cookie: Option<&str>,
    ) -> Vec<Listing> {
        let driver = StaticDriver::new(
            self.fetcher.as_ref(),
            self.settings.static_driver.clone(),
        )
        .with_budget(self.settings.strategy_timeout);
        let outcome = driver.run(platform, query, limit, cookie).await;
        let blocked = outcome.blocked_attempts();
        if blocked > 0 {
            tracing::debug!(%platform, blocked, "static run hit challenge pages");
        }
        if outcome.timed_out {
            self.log_timeout(platform, "static fetch", outcome.listings.len());
        }
        outcome.listings
    }

    async fn run_headless(
        &self,
        platform: Platform,
        query: &str,
        limit: usize,
        cookie: Option<&str>,
    ) -> Vec<Listing> {
        let driver = HeadlessDriver::new(self.fetcher.as_ref(), self.settings.headless.clone())
            .with_budget(self.settings.strategy_timeout);
        match driver.run(platform, query, limit, cookie).await {
            Ok(listings) => listings,
            Err(ScraperError::Capability(reason)) => {
                tracing::warn!(%platform, %reason, "headless rendering unavailable, skipping");
                Vec::new()
            }
            Err(ScraperError::Timeout { .. }) => {
                self.log_timeout(platform, "headless render", 0);
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(%platform, error = %e, "headless render failed");
                Vec::new()
            }
        }
    }

    async fn run_alternate(
        &self,
        platform: Platform,
        query: &str,
        limit: usize,
        cookie: Option<&str>,
        present: &ListingSet,
    ) -> Vec<Listing> {
        let url = platform.alternate_url(query);
        let req = StaticRequest::for_platform(platform, url, desktop_user_agent(1)).with_cookie(cookie);
        let body = match tokio::time::timeout(
            self.settings.strategy_timeout,
            self.fetcher.fetch_static(&req),
        )
        .await
        {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                tracing::warn!(%platform, url = %req.url, error = %e, "alternate endpoint failed");
                return Vec::new();
            }
            Err(_) => {
                self.log_timeout(platform, "alternate endpoint", 0);
                return Vec::new();
            }
        };
        if is_blocked(&body, platform) {
            tracing::warn!(%platform, url = %req.url, "alternate endpoint served a challenge");
            return Vec::new();
        }
        let ctx = ParseContext::new(platform, 1, limit.saturating_sub(present.len()))
            .with_seen(present)
            .with_require_moq(self.settings.require_moq);
        parse_export_body(&body, &ctx)
    }

    /// Images resolved before the budget runs out stay on their listings.
    async fn upgrade_images(&self, platform: Platform, listings: &mut [Listing], cookie: Option<&str>) {
        let upgrade = resolve_missing_images(
            self.fetcher.as_ref(),
            platform,
            listings,
            self.settings.image_concurrency,
            cookie,
        );
        if tokio::time::timeout(self.settings.strategy_timeout, upgrade)
            .await
            .is_err()
        {
            let with_image = listings.iter().filter(|l| !l.image.is_empty()).count();
            self.log_timeout(platform, "image upgrade", with_image);
        }
    }

    fn log_timeout(&self, platform: Platform, stage: &'static str, kept: usize) {
        let err = ScraperError::Timeout {
            stage,
            secs: self.settings.strategy_timeout.as_secs(),
        };
        tracing::warn!(%platform, error = %err, kept, "strategy budget exhausted");
    }
}

fn log_stage(options: &FetchOptions, platform: Platform, stage: Stage, count: usize) {
    if options.debug {
        tracing::info!(%platform, stage = stage.name(), count, "strategy finished");
    } else {
        tracing::debug!(%platform, stage = stage.name(), count, "strategy finished");
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
