pub mod app_config;
pub mod config;
pub mod listing;
pub mod options;
pub mod platform;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use listing::{Listing, ListingSet};
pub use options::FetchOptions;
pub use platform::Platform;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("unknown platform \"{0}\" (expected alibaba, 1688, made-in-china, or yiwugo)")]
    UnknownPlatform(String),
}
