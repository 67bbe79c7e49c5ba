//! Browser, pool and tab configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::whole_secs;

/// Chrome launch / attach configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Attach to an already running browser instead of launching one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// First remote debugging port; pooled instances count up from here.
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<String>,

    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Profile root for persistent login state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_dir: Option<String>,

    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    #[serde(default = "default_launch_timeout")]
    pub launch_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            debug_port: default_debug_port(),
            chrome_path: None,
            headless: default_headless(),
            profile_dir: None,
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            launch_timeout_secs: default_launch_timeout(),
        }
    }
}

impl BrowserConfig {
    /// Get the profile directory, creating default if not specified.
    pub fn profile_root(&self) -> PathBuf {
        match &self.profile_dir {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).to_string()),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".web2api")
                .join("browser-profile"),
        }
    }

    pub fn launch_timeout(&self) -> Duration {
        whole_secs(self.launch_timeout_secs)
    }
}

fn default_debug_port() -> u16 {
    9222
}

fn default_headless() -> bool {
    true
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    800
}

fn default_launch_timeout() -> u64 {
    15
}

/// Browser instance pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_instances")]
    pub max_instances: usize,

    /// Instances kept alive by the idle sweep.
    #[serde(default)]
    pub min_instances: usize,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_pool_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_instances: default_max_instances(),
            min_instances: 0,
            idle_timeout_secs: default_idle_timeout(),
            sweep_interval_secs: default_sweep_interval(),
            acquire_timeout_secs: default_pool_acquire_timeout(),
        }
    }
}

impl PoolConfig {
    pub fn idle_timeout(&self) -> Duration {
        whole_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        whole_secs(self.sweep_interval_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        whole_secs(self.acquire_timeout_secs)
    }
}

fn default_max_instances() -> usize {
    1
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_pool_acquire_timeout() -> u64 {
    30
}

/// Tab manager sizing (per browser instance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabConfig {
    #[serde(default = "default_max_tabs")]
    pub max_tabs: usize,

    #[serde(default)]
    pub min_tabs: usize,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for TabConfig {
    fn default() -> Self {
        Self {
            max_tabs: default_max_tabs(),
            min_tabs: 0,
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl TabConfig {
    /// Pool view of the tab limits.
    pub fn as_pool(&self) -> PoolConfig {
        PoolConfig {
            max_instances: self.max_tabs,
            min_instances: self.min_tabs,
            idle_timeout_secs: self.idle_timeout_secs,
            ..PoolConfig::default()
        }
    }
}

fn default_max_tabs() -> usize {
    8
}
