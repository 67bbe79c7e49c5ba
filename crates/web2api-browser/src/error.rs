//! Browser layer errors.

use thiserror::Error;

use crate::cdp::CdpError;

/// Errors raised by page drivers, the launcher and the pools.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Action failed: {0}")]
    ActionFailed(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Browser not connected")]
    NotConnected,

    #[error("Chrome not found. Please install Google Chrome or set browser.chrome_path.")]
    ChromeNotFound,

    #[error("Failed to launch Chrome: {0}")]
    LaunchFailed(String),

    /// No pooled resource became free within the acquire timeout.
    #[error("Timed out after {0:?} waiting for a free {1}")]
    AcquireTimeout(std::time::Duration, &'static str),

    /// The pool has been closed.
    #[error("{0} pool is closed")]
    PoolClosed(&'static str),

    #[error("Unknown {kind}: {id}")]
    UnknownResource { kind: &'static str, id: String },
}

impl From<CdpError> for BrowserError {
    fn from(e: CdpError) -> Self {
        match e {
            CdpError::ConnectionFailed(msg) => BrowserError::ConnectionFailed(msg),
            CdpError::ChromeNotAvailable(msg) => BrowserError::ConnectionFailed(msg),
            CdpError::NavigationFailed(msg) => BrowserError::NavigationFailed(msg),
            CdpError::JavaScript(msg) => BrowserError::Script(msg),
            CdpError::Timeout(msg) => BrowserError::ActionFailed(format!("Timeout: {}", msg)),
            CdpError::SessionClosed => BrowserError::NotConnected,
            _ => BrowserError::ActionFailed(e.to_string()),
        }
    }
}
