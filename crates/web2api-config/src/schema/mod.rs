//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

mod schema_browser;
mod schema_engine;
mod schema_site;

pub use schema_browser::*;
pub use schema_engine::*;
pub use schema_site::*;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub tabs: TabConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub stealth: StealthConfig,

    #[serde(default)]
    pub request: RequestConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub cookies: CookieConfig,

    /// Per-site automation profiles keyed by domain.
    #[serde(default)]
    pub sites: HashMap<String, SiteConfig>,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Site used when the requested model does not map to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_site: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            default_site: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files. Console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Cookie persistence configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CookieConfig {
    /// Directory holding one JSON cookie jar per site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

/// Longest duration any setting or step converts to.
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Fractional seconds as a [`Duration`], capped at [`MAX_DURATION`].
///
/// Negative or non-finite values collapse to zero.
pub fn secs_f64(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value.min(MAX_DURATION.as_secs_f64()))
    } else {
        Duration::ZERO
    }
}

fn whole_secs(value: u64) -> Duration {
    Duration::from_secs(value).min(MAX_DURATION)
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
