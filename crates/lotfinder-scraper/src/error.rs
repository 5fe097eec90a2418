use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        domain: String,
        retry_after_secs: u64,
    },

    #[error("page not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("login wall or bot challenge served for {url}")]
    Blocked { url: String },

    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    #[error("capability unavailable: {0}")]
    Capability(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("image cache error for {url}: {reason}")]
    ImageCache { url: String, reason: String },
}

impl ScraperError {
    /// `true` for server-side statuses worth another attempt.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, ScraperError::UnexpectedStatus { status, .. } if *status >= 500)
    }
}
