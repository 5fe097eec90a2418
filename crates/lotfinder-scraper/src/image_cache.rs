//! Local image cache used when a caller asks for `cache_images`.
//!
//! Files are content-addressed by the SHA-256 of the remote URL, so the same
//! image is only ever downloaded once per cache directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use lotfinder_core::Listing;
use reqwest::Client;
use sha2::{Digest, Sha256};

use crate::error::ScraperError;
use crate::fetcher::DESKTOP_USER_AGENTS;

const KNOWN_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "avif", "gif"];

/// Turns a remote image URL into a locally addressable one.
#[async_trait]
pub trait ImageCache: Send + Sync {
    /// # Errors
    ///
    /// Any error means "keep the remote URL"; callers never fail on it.
    async fn cache(&self, url: &str) -> Result<String, ScraperError>;
}

pub struct DiskImageCache {
    dir: PathBuf,
    client: Client,
}

impl DiskImageCache {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(dir: impl Into<PathBuf>, timeout_secs: u64) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(DESKTOP_USER_AGENTS[0])
            .build()?;
        Ok(Self {
            dir: dir.into(),
            client,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn io_error(url: &str, e: &std::io::Error) -> ScraperError {
        ScraperError::ImageCache {
            url: url.to_owned(),
            reason: e.to_string(),
        }
    }
}

/// `<sha256(url)>.<ext>`, with the extension taken from the URL path.
pub(crate) fn cache_file_name(url: &str) -> String {
    let hash = format!("{:x}", Sha256::digest(url.as_bytes()));
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    // CDN thumbnails look like `H123.jpg_300x300.jpg`; the last extension wins.
    let ext = file
        .rsplit('.')
        .next()
        .map(str::to_ascii_lowercase)
        .filter(|ext| KNOWN_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| "jpg".to_owned());
    format!("{hash}.{ext}")
}

#[async_trait]
impl ImageCache for DiskImageCache {
    async fn cache(&self, url: &str) -> Result<String, ScraperError> {
        let path = self.dir.join(cache_file_name(url));
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(path.to_string_lossy().into_owned());
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ScraperError::ImageCache {
                url: url.to_owned(),
                reason: "empty response body".to_owned(),
            });
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Self::io_error(url, &e))?;
        let partial = path.with_extension("part");
        tokio::fs::write(&partial, &bytes)
            .await
            .map_err(|e| Self::io_error(url, &e))?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| Self::io_error(url, &e))?;

        tracing::debug!(url, path = %path.display(), bytes = bytes.len(), "image cached");
        Ok(path.to_string_lossy().into_owned())
    }
}

/// Swaps each listing's remote image for a cached copy. Failures keep the
/// remote URL. Returns how many images were cached.
pub async fn cache_listing_images(cache: &dyn ImageCache, listings: &mut [Listing]) -> usize {
    let mut cached = 0;
    for listing in listings.iter_mut() {
        let remote = listing.image.trim();
        if !remote.starts_with("http") {
            continue;
        }
        match cache.cache(remote).await {
            Ok(local) => {
                listing.image = local;
                cached += 1;
            }
            Err(e) => {
                tracing::warn!(url = %listing.image, error = %e, "image cache failed, keeping remote URL");
            }
        }
    }
    cached
}
