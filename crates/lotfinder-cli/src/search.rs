//! Handlers for the `search` and `resolve-image` commands.

use std::sync::Arc;

use clap::Args;
use lotfinder_core::{AppConfig, FetchOptions, Platform};
use lotfinder_scraper::{
    resolve_image, DiskImageCache, HarvestSettings, Harvester, HttpFetcher, MetricsCollector,
    PageFetcher,
};

/// Default number of listings requested by `search`.
pub(crate) const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, Args)]
pub(crate) struct SearchArgs {
    /// alibaba, 1688, made-in-china, or yiwugo
    pub platform: Platform,

    /// Search terms
    pub query: String,

    /// Maximum number of listings to return
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,

    /// Fall back to a headless browser when static results are sparse
    #[arg(long)]
    pub headless: bool,

    /// Skip plain HTTP fetching and render with a headless browser
    #[arg(long)]
    pub force_headless: bool,

    /// Visit detail pages to recover missing images
    #[arg(long)]
    pub upgrade_images: bool,

    /// Download images into the local cache directory
    #[arg(long)]
    pub cache_images: bool,

    /// Log per-strategy result counts
    #[arg(long)]
    pub debug: bool,
}

impl SearchArgs {
    pub(crate) fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            headless: self.headless,
            force_headless: self.force_headless,
            upgrade_images: self.upgrade_images,
            cache_images: self.cache_images,
            debug: self.debug,
        }
    }
}

fn build_fetcher(config: &AppConfig) -> anyhow::Result<Arc<dyn PageFetcher>> {
    let fetcher = HttpFetcher::from_config(config)
        .map_err(|e| anyhow::anyhow!("failed to build HTTP fetcher: {e}"))?;
    Ok(Arc::new(fetcher))
}

/// Runs one orchestrated fetch and prints the listings to stdout as JSON.
///
/// The platform's metrics snapshot goes to stderr so stdout stays parseable.
///
/// # Errors
///
/// Returns an error for an unusable query or when the HTTP client or image
/// cache cannot be constructed. Scraping failures only shrink the result.
pub(crate) async fn run_search(config: &AppConfig, args: SearchArgs) -> anyhow::Result<()> {
    let metrics = Arc::new(MetricsCollector::new());
    let mut harvester = Harvester::new(
        build_fetcher(config)?,
        Arc::clone(&metrics),
        HarvestSettings::from_config(config),
    );
    if args.cache_images {
        let cache = DiskImageCache::new(&config.image_cache_dir, config.request_timeout_secs)
            .map_err(|e| anyhow::anyhow!("failed to build image cache: {e}"))?;
        harvester = harvester.with_image_cache(Arc::new(cache));
    }

    let options = args.fetch_options();
    let listings = harvester
        .fetch_listings(args.platform, &args.query, args.limit, &options)
        .await?;

    if listings.is_empty() {
        tracing::warn!(platform = %args.platform, query = %args.query, "no listings found");
    }
    println!("{}", serde_json::to_string_pretty(&listings)?);
    if let Some(snapshot) = metrics.snapshot(args.platform) {
        eprintln!("{}", serde_json::to_string(&snapshot)?);
    }
    Ok(())
}

/// Prints the product image found on `url`, or nothing.
///
/// # Errors
///
/// Returns an error when the HTTP client cannot be built or the page cannot
/// be fetched.
pub(crate) async fn run_resolve_image(
    config: &AppConfig,
    platform: Platform,
    url: &str,
) -> anyhow::Result<()> {
    let fetcher = build_fetcher(config)?;
    let image = resolve_image(
        fetcher.as_ref(),
        platform,
        url,
        config.session_cookie(platform),
    )
    .await?;
    match image {
        Some(image) => println!("{image}"),
        None => tracing::info!(%platform, url, "no product image found"),
    }
    Ok(())
}
