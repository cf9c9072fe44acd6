use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::batch::retry::RetryPolicy;
use crate::market::listing::ListingTemplate;

/// Startup configuration problems. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("currency '{0}' is not in the allowed list")]
    UnknownCurrency(String),

    #[error("item origin '{0}' is not in the allowed list")]
    UnknownOrigin(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub market: MarketConfig,
    pub batch: BatchConfig,
    pub retry: RetryPolicy,
    pub listing: ListingTemplate,
}

#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// REST API root
    pub base_url: String,
    /// Public site root used to render listing links
    pub listing_url: String,
    pub token: String,
    pub user_id: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub upload_batch_size: usize,
    pub upload_delay: Duration,
    pub remove_batch_size: usize,
    pub remove_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            upload_batch_size: 5,
            upload_delay: Duration::from_millis(2000),
            remove_batch_size: 3,
            remove_delay: Duration::from_millis(1500),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let or_default =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let base_url = or_default("MARKET_BASE_URL", "https://prod-api.lzt.market");
        check_url("MARKET_BASE_URL", &base_url)?;
        let listing_url = or_default("MARKET_LISTING_URL", "https://lzt.market");
        check_url("MARKET_LISTING_URL", &listing_url)?;

        let market = MarketConfig {
            base_url,
            listing_url,
            token: required("MARKET_TOKEN")?,
            user_id: required("MARKET_USER_ID")?,
            timeout: Duration::from_secs(positive(
                "MARKET_TIMEOUT_SECS",
                &or_default("MARKET_TIMEOUT_SECS", "30"),
            )?),
        };

        let batch = BatchConfig {
            upload_batch_size: positive(
                "UPLOAD_BATCH_SIZE",
                &or_default("UPLOAD_BATCH_SIZE", "5"),
            )?,
            upload_delay: Duration::from_millis(parse(
                "UPLOAD_BATCH_DELAY_MS",
                &or_default("UPLOAD_BATCH_DELAY_MS", "2000"),
            )?),
            remove_batch_size: positive(
                "REMOVE_BATCH_SIZE",
                &or_default("REMOVE_BATCH_SIZE", "3"),
            )?,
            remove_delay: Duration::from_millis(parse(
                "REMOVE_BATCH_DELAY_MS",
                &or_default("REMOVE_BATCH_DELAY_MS", "1500"),
            )?),
        };

        let retry = RetryPolicy {
            max_attempts: positive(
                "RETRY_MAX_ATTEMPTS",
                &or_default("RETRY_MAX_ATTEMPTS", "5"),
            )?,
            backoff_cap: Duration::from_secs(parse(
                "RETRY_BACKOFF_CAP_SECS",
                &or_default("RETRY_BACKOFF_CAP_SECS", "30"),
            )?),
            retry_server_errors: parse(
                "RETRY_SERVER_ERRORS",
                &or_default("RETRY_SERVER_ERRORS", "false"),
            )?,
        };

        let listing = match lookup("LISTING_CONFIG") {
            Some(path) if !path.trim().is_empty() => load_listing_template(Path::new(&path))?,
            _ => ListingTemplate::default(),
        };
        listing.validate()?;

        Ok(Self {
            market,
            batch,
            retry,
            listing,
        })
    }
}

/// Read the listing template from a TOML file. Missing keys keep their defaults.
pub fn load_listing_template(path: &Path) -> Result<ListingTemplate, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn positive<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let parsed: T = parse(key, value)?;
    if parsed <= T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(parsed)
}

fn check_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}
