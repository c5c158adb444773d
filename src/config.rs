//! Runtime configuration, read from the environment (and `.env`).
//!
//! | Variable                   | Default                 | Description                                      |
//! |----------------------------|-------------------------|--------------------------------------------------|
//! | `YTZIP_BACKEND_URL`        | `http://127.0.0.1:8000` | Base URL of the download backend                 |
//! | `YTZIP_POLL_INTERVAL_MS`   | `1000`                  | Milliseconds between progress polls              |
//! | `YTZIP_RESET_DELAY_MS`     | `2000`                  | Delay before the UI resets after saving          |
//! | `YTZIP_MAX_POLL_SECS`      | `3600`                  | Give up polling after this; `0` disables         |
//! | `YTZIP_DOWNLOAD_DIR`       | `./downloads`           | Folder the ZIP archive is saved into             |
//! | `YTZIP_CONNECT_TIMEOUT_MS` | `5000`                  | TCP connect timeout for every request            |
//! | `YTZIP_REQUEST_TIMEOUT_MS` | `10000`                 | Timeout for job creation and each progress poll  |
//! | `YTZIP_STALL_TIMEOUT_MS`   | `30000`                 | Longest wait for the next archive chunk          |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_RESET_DELAY_MS: u64 = 2000;
const DEFAULT_MAX_POLL_SECS: u64 = 3600;
const DEFAULT_DOWNLOAD_DIR: &str = "./downloads";
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_STALL_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is not a valid URL: {value}")]
    InvalidUrl { key: &'static str, value: String },

    #[error("{key} must be a non-negative integer, got {value}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },
}

/// Timing knobs for [`JobPoller`](crate::poller::JobPoller)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    pub reset_delay: Duration,
    /// `None` polls until the backend reports completion or failure
    pub max_poll_duration: Option<Duration>,
    pub download_dir: PathBuf,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            reset_delay: Duration::from_millis(DEFAULT_RESET_DELAY_MS),
            max_poll_duration: Some(Duration::from_secs(DEFAULT_MAX_POLL_SECS)),
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
        }
    }
}

/// Timeouts for [`HttpBackend`](crate::backend::HttpBackend)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    /// Bounds job creation and each progress poll, so a silent backend
    /// can't pile up open requests tick after tick
    pub request_timeout: Duration,
    /// Longest gap between two archive chunks; the archive download as a
    /// whole is not time-limited
    pub stall_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            stall_timeout: Duration::from_millis(DEFAULT_STALL_TIMEOUT_MS),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub backend_url: Url,
    pub poller: PollerConfig,
    pub http: HttpConfig,
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend_url = match lookup("YTZIP_BACKEND_URL") {
            Some(value) => Url::parse(&value).map_err(|_| ConfigError::InvalidUrl {
                key: "YTZIP_BACKEND_URL",
                value,
            })?,
            None => Url::parse(DEFAULT_BACKEND_URL).map_err(|_| ConfigError::InvalidUrl {
                key: "YTZIP_BACKEND_URL",
                value: DEFAULT_BACKEND_URL.to_string(),
            })?,
        };

        let poll_interval_ms = positive(&lookup, "YTZIP_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        let reset_delay_ms = number(&lookup, "YTZIP_RESET_DELAY_MS", DEFAULT_RESET_DELAY_MS)?;
        let max_poll_secs = number(&lookup, "YTZIP_MAX_POLL_SECS", DEFAULT_MAX_POLL_SECS)?;

        let download_dir = lookup("YTZIP_DOWNLOAD_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DOWNLOAD_DIR.to_string());

        Ok(Self {
            backend_url,
            poller: PollerConfig {
                poll_interval: Duration::from_millis(poll_interval_ms),
                reset_delay: Duration::from_millis(reset_delay_ms),
                max_poll_duration: (max_poll_secs > 0).then(|| Duration::from_secs(max_poll_secs)),
                download_dir: PathBuf::from(download_dir),
            },
            http: HttpConfig {
                connect_timeout: Duration::from_millis(positive(
                    &lookup,
                    "YTZIP_CONNECT_TIMEOUT_MS",
                    DEFAULT_CONNECT_TIMEOUT_MS,
                )?),
                request_timeout: Duration::from_millis(positive(
                    &lookup,
                    "YTZIP_REQUEST_TIMEOUT_MS",
                    DEFAULT_REQUEST_TIMEOUT_MS,
                )?),
                stall_timeout: Duration::from_millis(positive(
                    &lookup,
                    "YTZIP_STALL_TIMEOUT_MS",
                    DEFAULT_STALL_TIMEOUT_MS,
                )?),
            },
        })
    }
}

fn positive(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match number(lookup, key, default)? {
        0 => Err(ConfigError::Zero { key }),
        value => Ok(value),
    }
}

fn number(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config.backend_url.as_str(), "http://127.0.0.1:8000/");
        assert_eq!(config.poller, PollerConfig::default());
        assert_eq!(config.http, HttpConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("YTZIP_BACKEND_URL", "https://dl.example.com/api/"),
            ("YTZIP_POLL_INTERVAL_MS", "250"),
            ("YTZIP_RESET_DELAY_MS", "0"),
            ("YTZIP_MAX_POLL_SECS", "0"),
            ("YTZIP_DOWNLOAD_DIR", "/tmp/zips"),
            ("YTZIP_CONNECT_TIMEOUT_MS", "1500"),
            ("YTZIP_REQUEST_TIMEOUT_MS", "4000"),
            ("YTZIP_STALL_TIMEOUT_MS", "60000"),
        ])
        .unwrap();
        assert_eq!(config.backend_url.as_str(), "https://dl.example.com/api/");
        assert_eq!(config.poller.poll_interval, Duration::from_millis(250));
        assert_eq!(config.poller.reset_delay, Duration::ZERO);
        assert_eq!(config.poller.max_poll_duration, None);
        assert_eq!(config.poller.download_dir, PathBuf::from("/tmp/zips"));
        assert_eq!(config.http.connect_timeout, Duration::from_millis(1500));
        assert_eq!(config.http.request_timeout, Duration::from_secs(4));
        assert_eq!(config.http.stall_timeout, Duration::from_secs(60));
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            load(&[("YTZIP_BACKEND_URL", "localhost 8000")]),
            Err(ConfigError::InvalidUrl {
                key: "YTZIP_BACKEND_URL",
                value: "localhost 8000".to_string()
            })
        );
        assert_eq!(
            load(&[("YTZIP_POLL_INTERVAL_MS", "soon")]),
            Err(ConfigError::InvalidNumber {
                key: "YTZIP_POLL_INTERVAL_MS",
                value: "soon".to_string()
            })
        );
        assert_eq!(
            load(&[("YTZIP_POLL_INTERVAL_MS", "0")]),
            Err(ConfigError::Zero {
                key: "YTZIP_POLL_INTERVAL_MS"
            })
        );
        assert_eq!(
            load(&[("YTZIP_REQUEST_TIMEOUT_MS", "0")]),
            Err(ConfigError::Zero {
                key: "YTZIP_REQUEST_TIMEOUT_MS"
            })
        );
    }
}
