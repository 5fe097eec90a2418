pub mod block;
pub mod canonical;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod headless;
pub mod image_cache;
pub mod images;
pub mod markup;
pub mod metrics;
pub mod orchestrator;
pub mod quality;
pub(crate) mod rate_limit;
pub mod static_driver;

pub use block::is_blocked;
pub use canonical::{canonicalize_for, canonicalize_url};
pub use error::ScraperError;
pub use extract::{extract_moq, extract_price_and_currency, PriceInfo};
pub use fetcher::{HttpFetcher, PageFetcher, RenderRequest, RenderedPage, StaticRequest};
pub use headless::{HeadlessDriver, HeadlessSettings};
pub use image_cache::{DiskImageCache, ImageCache};
pub use images::{extract_detail_image, resolve_image, resolve_missing_images};
pub use markup::{parse_export_body, parse_listings, ParseContext, RawCard};
pub use metrics::{FetchOutcome, MetricsCollector, MetricsSnapshot};
pub use orchestrator::{Harvester, HarvestSettings};
pub use quality::{apply_quality_filter, passes_quality};
pub use static_driver::{StaticDriver, StaticOutcome, StaticSettings};
