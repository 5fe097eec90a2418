use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub request_timeout_secs: u64,
    pub max_pages: u32,
    pub page_delay_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub image_concurrency: usize,
    pub require_moq: bool,
    pub headless_max_rounds: u32,
    pub headless_settle_ms: u64,
    pub strategy_timeout_secs: u64,
    pub chrome_path: Option<PathBuf>,
    pub image_cache_dir: PathBuf,
    /// Opaque `name=value; name2=value2` session cookie strings per platform.
    pub session_cookies: BTreeMap<Platform, String>,
}

impl AppConfig {
    /// Session cookie string configured for `platform`, if any.
    #[must_use]
    pub fn session_cookie(&self, platform: Platform) -> Option<&str> {
        self.session_cookies.get(&platform).map(String::as_str)
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cookies: Vec<&str> = self
            .session_cookies
            .keys()
            .map(|p| p.slug())
            .collect();
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_pages", &self.max_pages)
            .field("page_delay_ms", &self.page_delay_ms)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("image_concurrency", &self.image_concurrency)
            .field("require_moq", &self.require_moq)
            .field("headless_max_rounds", &self.headless_max_rounds)
            .field("headless_settle_ms", &self.headless_settle_ms)
            .field("strategy_timeout_secs", &self.strategy_timeout_secs)
            .field("chrome_path", &self.chrome_path)
            .field("image_cache_dir", &self.image_cache_dir)
            .field("session_cookies", &format!("[redacted: {}]", cookies.join(", ")))
            .finish()
    }
}
