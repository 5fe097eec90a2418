use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::app_config::{AppConfig, Environment};
use crate::{ConfigError, Platform};

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got \"{other}\""))),
        }
    };

    let env = parse_environment(&or_default("LOTFINDER_ENV", "development"))?;
    let log_level = or_default("LOTFINDER_LOG_LEVEL", "info");

    let request_timeout_secs = parse_u64("LOTFINDER_REQUEST_TIMEOUT_SECS", "20")?;
    let max_pages = parse_u32("LOTFINDER_MAX_PAGES", "3")?;
    let page_delay_ms = parse_u64("LOTFINDER_PAGE_DELAY_MS", "400")?;
    let max_retries = parse_u32("LOTFINDER_MAX_RETRIES", "1")?;
    let retry_backoff_base_ms = parse_u64("LOTFINDER_RETRY_BACKOFF_BASE_MS", "500")?;
    let image_concurrency = parse_usize("LOTFINDER_IMAGE_CONCURRENCY", "4")?;
    let require_moq = parse_bool("LOTFINDER_REQUIRE_MOQ", "false")?;
    let headless_max_rounds = parse_u32("LOTFINDER_HEADLESS_MAX_ROUNDS", "8")?;
    let headless_settle_ms = parse_u64("LOTFINDER_HEADLESS_SETTLE_MS", "1200")?;
    let strategy_timeout_secs = parse_u64("LOTFINDER_STRATEGY_TIMEOUT_SECS", "90")?;
    let chrome_path = optional("LOTFINDER_CHROME_PATH").map(PathBuf::from);
    let image_cache_dir = PathBuf::from(or_default("LOTFINDER_IMAGE_CACHE_DIR", "./cache/images"));

    if request_timeout_secs == 0 {
        return Err(invalid(
            "LOTFINDER_REQUEST_TIMEOUT_SECS",
            "must be greater than zero".to_string(),
        ));
    }
    if max_pages == 0 {
        return Err(invalid(
            "LOTFINDER_MAX_PAGES",
            "must be greater than zero".to_string(),
        ));
    }
    if image_concurrency == 0 {
        return Err(invalid(
            "LOTFINDER_IMAGE_CONCURRENCY",
            "must be greater than zero".to_string(),
        ));
    }

    let session_cookies: BTreeMap<Platform, String> = Platform::ALL
        .into_iter()
        .filter_map(|platform| {
            let var = format!("LOTFINDER_COOKIE_{}", platform.cookie_env_suffix());
            optional(&var).map(|cookie| (platform, cookie))
        })
        .collect();

    Ok(AppConfig {
        env,
        log_level,
        request_timeout_secs,
        max_pages,
        page_delay_ms,
        max_retries,
        retry_backoff_base_ms,
        image_concurrency,
        require_moq,
        headless_max_rounds,
        headless_settle_ms,
        strategy_timeout_secs,
        chrome_path,
        image_cache_dir,
        session_cookies,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "LOTFINDER_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
