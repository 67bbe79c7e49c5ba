//! Engine tuning: stream detection, input typing, stealth pacing, request gate.
//!
//! The stability and shrink constants are empirically tuned per site; they
//! stay configuration rather than code.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{MAX_DURATION, secs_f64 as secs, whole_secs};

/// Stream monitor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Delay between DOM samples in the response loop.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: f64,

    /// Quiet period that ends a stable stream.
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold_secs: f64,

    /// Consecutive unchanged samples that arm the silence timer.
    #[serde(default = "default_stability_threshold")]
    pub stability_threshold: u32,

    /// Absolute ceiling for one response.
    #[serde(default = "default_hard_timeout")]
    pub hard_timeout_secs: u64,

    #[serde(default = "default_confirm_window")]
    pub confirm_window_secs: f64,

    #[serde(default = "default_confirm_poll")]
    pub confirm_poll_secs: f64,

    #[serde(default = "default_confirm_stable_polls")]
    pub confirm_stable_polls: u32,

    /// Shrink (in characters) still treated as rendering jitter.
    #[serde(default = "default_shrink_tolerance")]
    pub shrink_tolerance: usize,

    /// How long the silence rule is suspended while nothing has been emitted.
    #[serde(default = "default_response_start_timeout")]
    pub response_start_timeout_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            silence_threshold_secs: default_silence_threshold(),
            stability_threshold: default_stability_threshold(),
            hard_timeout_secs: default_hard_timeout(),
            confirm_window_secs: default_confirm_window(),
            confirm_poll_secs: default_confirm_poll(),
            confirm_stable_polls: default_confirm_stable_polls(),
            shrink_tolerance: default_shrink_tolerance(),
            response_start_timeout_secs: default_response_start_timeout(),
        }
    }
}

impl StreamConfig {
    pub fn poll_interval(&self) -> Duration {
        secs(self.poll_interval_secs)
    }

    pub fn silence_threshold(&self) -> Duration {
        secs(self.silence_threshold_secs)
    }

    pub fn hard_timeout(&self) -> Duration {
        whole_secs(self.hard_timeout_secs)
    }

    pub fn confirm_window(&self) -> Duration {
        secs(self.confirm_window_secs)
    }

    pub fn confirm_poll(&self) -> Duration {
        secs(self.confirm_poll_secs)
    }

    pub fn response_start_timeout(&self) -> Duration {
        whole_secs(self.response_start_timeout_secs)
    }
}

fn default_poll_interval() -> f64 {
    0.5
}

fn default_silence_threshold() -> f64 {
    6.0
}

fn default_stability_threshold() -> u32 {
    5
}

fn default_hard_timeout() -> u64 {
    600
}

fn default_confirm_window() -> f64 {
    1.5
}

fn default_confirm_poll() -> f64 {
    0.3
}

fn default_confirm_stable_polls() -> u32 {
    5
}

fn default_shrink_tolerance() -> usize {
    3
}

fn default_response_start_timeout() -> u64 {
    120
}

/// Input typing and element lookup tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Largest text inserted in one piece.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_pause")]
    pub chunk_pause_ms: u64,

    #[serde(default = "default_verify_attempts")]
    pub verify_attempts: u32,

    #[serde(default = "default_locate_timeout")]
    pub locate_timeout_secs: f64,

    #[serde(default = "default_locate_poll")]
    pub locate_poll_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_pause_ms: default_chunk_pause(),
            verify_attempts: default_verify_attempts(),
            locate_timeout_secs: default_locate_timeout(),
            locate_poll_ms: default_locate_poll(),
        }
    }
}

impl InputConfig {
    pub fn chunk_pause(&self) -> Duration {
        Duration::from_millis(self.chunk_pause_ms).min(MAX_DURATION)
    }

    pub fn locate_timeout(&self) -> Duration {
        secs(self.locate_timeout_secs)
    }

    pub fn locate_poll(&self) -> Duration {
        Duration::from_millis(self.locate_poll_ms).min(MAX_DURATION)
    }
}

fn default_chunk_size() -> usize {
    30_000
}

fn default_chunk_pause() -> u64 {
    100
}

fn default_verify_attempts() -> u32 {
    3
}

fn default_locate_timeout() -> f64 {
    5.0
}

fn default_locate_poll() -> u64 {
    250
}

/// Randomized pacing applied after key presses on stealth sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StealthConfig {
    #[serde(default = "default_min_delay")]
    pub min_delay_secs: f64,

    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,
}

impl Default for StealthConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: default_min_delay(),
            max_delay_secs: default_max_delay(),
        }
    }
}

fn default_min_delay() -> f64 {
    0.1
}

fn default_max_delay() -> f64 {
    0.3
}

/// Single-flight request gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    #[serde(default = "default_gate_poll")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_secs: default_acquire_timeout(),
            poll_interval_ms: default_gate_poll(),
            history_limit: default_history_limit(),
        }
    }
}

impl RequestConfig {
    pub fn acquire_timeout(&self) -> Duration {
        whole_secs(self.acquire_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).min(MAX_DURATION)
    }
}

fn default_acquire_timeout() -> u64 {
    60
}

fn default_gate_poll() -> u64 {
    100
}

fn default_history_limit() -> usize {
    100
}
