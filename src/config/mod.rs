//! Runtime configuration loaded from environment-style key/values.
//!
//! `main` loads an optional `.env` file with dotenvy first, so everything
//! here only ever reads the process environment. Parsing goes through a
//! lookup function so tests can feed values without touching global state.

mod browser;

pub use browser::BrowserEngineConfig;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::rate_limit::RateLimitConfig;

/// Default DGII page listing the electronic invoice issuers.
pub const DEFAULT_TARGET_URL: &str =
    "https://dgii.gov.do/app/WebApps/Misc/VerLista/?doc=EEC160525";

/// Default refresh schedule: every day at 03:00 local time.
pub const DEFAULT_SCHEDULE: &str = "0 3 * * *";

/// Errors from reading configuration. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },

    #[error("Invalid URL for {key}: {source}")]
    Url {
        key: String,
        #[source]
        source: url::ParseError,
    },
}

impl ConfigError {
    pub fn invalid(key: &str, value: &str) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Allowed CORS origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

impl CorsOrigins {
    fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            Self::Any
        } else {
            Self::List(origins)
        }
    }
}

/// Fully resolved application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Directory the browser downloads into.
    pub download_path: PathBuf,
    /// Page hosting the download trigger.
    pub target_url: Url,
    /// Browser launch/connection settings.
    pub browser: BrowserEngineConfig,
    /// How long to wait for a download to show up.
    pub download_timeout: Duration,
    /// Extraction attempts, also used as the locator pass budget.
    pub max_retries: u32,
    /// Delay between extraction attempts.
    pub retry_delay: Duration,
    /// Cron expression for scheduled refreshes.
    pub update_schedule: String,
    /// Refresh once when the server starts.
    pub force_update_on_start: bool,
    pub host: String,
    pub port: u16,
    pub cors_origins: CorsOrigins,
    /// General API rate limit.
    pub rate_limit: RateLimitConfig,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    ///
    /// Missing keys fall back to defaults; present but malformed values are
    /// errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let target_raw = get("DGII_URL").unwrap_or_else(|| DEFAULT_TARGET_URL.to_string());
        let target_url = Url::parse(target_raw.trim()).map_err(|source| ConfigError::Url {
            key: "DGII_URL".to_string(),
            source,
        })?;

        let browser = BrowserEngineConfig::default().with_overrides(&get)?;

        // RATE_LIMIT_WINDOW_MS is the legacy name; it always held minutes
        let window_keys = ["RATE_LIMIT_WINDOW_MINUTES", "RATE_LIMIT_WINDOW_MS"];
        let window_secs = match lookup_first(&get, &window_keys) {
            Some((key, raw)) => {
                let minutes = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::invalid(key, &raw))?;
                minutes
                    .checked_mul(60)
                    .ok_or_else(|| ConfigError::invalid(key, &raw))?
            }
            None => 15 * 60,
        };
        let rate_limit = RateLimitConfig::new(
            Duration::from_secs(window_secs),
            parse_num(&get, "RATE_LIMIT_MAX", 100u32)?,
        );

        Ok(Self {
            db_path: get("DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./dgii_data.db")),
            download_path: get("DOWNLOAD_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./downloads")),
            target_url,
            browser,
            download_timeout: Duration::from_millis(parse_num(&get, "DOWNLOAD_TIMEOUT", 60_000u64)?),
            max_retries: parse_num(&get, "MAX_RETRIES", 3u32)?.max(1),
            retry_delay: Duration::from_millis(parse_num(&get, "RETRY_DELAY_MS", 5_000u64)?),
            update_schedule: get("UPDATE_SCHEDULE")
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| DEFAULT_SCHEDULE.to_string()),
            force_update_on_start: match get("FORCE_UPDATE_ON_START") {
                Some(v) => parse_bool("FORCE_UPDATE_ON_START", &v)?,
                None => false,
            },
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_num(&get, "PORT", 3000u16)?,
            cors_origins: CorsOrigins::parse(&get("CORS_ORIGINS").unwrap_or_else(|| "*".into())),
            rate_limit,
        })
    }

    /// `host:port` the HTTP server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_num<T, F>(get: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::invalid(key, &raw)),
        None => Ok(default),
    }
}

/// First non-blank value among `keys`, with the key it came from.
pub(crate) fn lookup_first<F>(lookup: &F, keys: &[&'static str]) -> Option<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter().find_map(|&key| {
        lookup(key)
            .filter(|v| !v.trim().is_empty())
            .map(|v| (key, v))
    })
}

/// Parse a boolean flag. Accepts true/false, 1/0, yes/no, on/off.
pub(crate) fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, raw)),
    }
}
