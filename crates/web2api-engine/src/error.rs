//! Engine error types and their wire taxonomy.

use std::time::Duration;

use thiserror::Error;
use web2api_browser::BrowserError;

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No profile for the requested site.
    #[error("Site '{0}' is not configured")]
    SiteNotConfigured(String),

    /// A required step could not find its element.
    #[error("Element '{target}' not found (tried: {selectors})")]
    ElementNotFound { target: String, selectors: String },

    /// Typed text never read back correctly.
    #[error("Input did not match the prompt after {attempts} attempts")]
    InputMismatch { attempts: u32 },

    /// Blank or error page where the site should be.
    #[error("Page is not ready: {0}. Check that the site loads and you are logged in.")]
    PageNotReady(String),

    /// The browser session stayed busy past the acquire timeout.
    #[error("Timed out after {0:?} waiting for the browser session")]
    AcquireTimeout(Duration),

    /// The reply did not finish within the hard ceiling.
    #[error("Reply did not complete within {0:?}")]
    StreamTimeout(Duration),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Cookie storage error: {0}")]
    Storage(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    /// Cooperative cancellation; ends a stream normally.
    #[error("Request cancelled")]
    Cancelled,
}

impl EngineError {
    /// `type` field of the error body.
    pub fn error_type(&self) -> &'static str {
        match self {
            EngineError::SiteNotConfigured(_) => "configuration_error",
            EngineError::ElementNotFound { .. }
            | EngineError::InputMismatch { .. }
            | EngineError::Execution(_)
            | EngineError::Storage(_)
            | EngineError::Cancelled => "execution_error",
            EngineError::PageNotReady(_) => "page_error",
            EngineError::AcquireTimeout(_) | EngineError::StreamTimeout(_) => "timeout_error",
            EngineError::Browser(_) => "browser_error",
        }
    }

    /// `code` field of the error body.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::SiteNotConfigured(_) => "site_not_configured",
            EngineError::ElementNotFound { .. } => "element_not_found",
            EngineError::InputMismatch { .. } => "input_mismatch",
            EngineError::PageNotReady(_) => "page_not_ready",
            EngineError::AcquireTimeout(_) => "acquire_timeout",
            EngineError::StreamTimeout(_) => "stream_timeout",
            EngineError::Browser(_) => "browser_error",
            EngineError::Storage(_) => "storage_error",
            EngineError::Execution(_) => "execution_failed",
            EngineError::Cancelled => "cancelled",
        }
    }

    /// HTTP status for non-streaming responses.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::SiteNotConfigured(_) => 404,
            EngineError::PageNotReady(_) => 503,
            EngineError::AcquireTimeout(_) => 429,
            EngineError::StreamTimeout(_) => 504,
            EngineError::Cancelled => 499,
            EngineError::Storage(_) => 500,
            EngineError::ElementNotFound { .. }
            | EngineError::InputMismatch { .. }
            | EngineError::Browser(_)
            | EngineError::Execution(_) => 502,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy() {
        let cases = [
            (
                EngineError::SiteNotConfigured("x".into()),
                "configuration_error",
                "site_not_configured",
                404,
            ),
            (
                EngineError::ElementNotFound {
                    target: "input_box".into(),
                    selectors: "textarea".into(),
                },
                "execution_error",
                "element_not_found",
                502,
            ),
            (
                EngineError::InputMismatch { attempts: 3 },
                "execution_error",
                "input_mismatch",
                502,
            ),
            (
                EngineError::PageNotReady("about:blank".into()),
                "page_error",
                "page_not_ready",
                503,
            ),
            (
                EngineError::AcquireTimeout(Duration::from_secs(60)),
                "timeout_error",
                "acquire_timeout",
                429,
            ),
            (
                EngineError::StreamTimeout(Duration::from_secs(600)),
                "timeout_error",
                "stream_timeout",
                504,
            ),
            (
                EngineError::Browser(BrowserError::NotConnected),
                "browser_error",
                "browser_error",
                502,
            ),
        ];

        for (err, error_type, code, status) in cases {
            assert_eq!(err.error_type(), error_type, "{}", err);
            assert_eq!(err.code(), code, "{}", err);
            assert_eq!(err.status_code(), status, "{}", err);
        }
    }

    #[test]
    fn test_from_browser_error() {
        let err: EngineError = BrowserError::ChromeNotFound.into();
        assert!(matches!(err, EngineError::Browser(_)));
        assert!(!err.is_cancelled());
        assert!(EngineError::Cancelled.is_cancelled());
    }
}
