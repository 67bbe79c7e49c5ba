//! Errors of the DevTools transport.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CdpError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Nothing answered on the debugging endpoint.
    #[error("No debuggable Chrome at {0} (is it running with --remote-debugging-port?)")]
    ChromeNotAvailable(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// `error` member of a command reply.
    #[error("CDP error {code}: {message}")]
    Protocol { code: i64, message: String },

    #[error("Malformed reply: {0}")]
    InvalidResponse(String),

    #[error("Malformed JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// `exceptionDetails` of `Runtime.evaluate`.
    #[error("Script threw: {0}")]
    JavaScript(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    /// Socket closed with the command still pending.
    #[error("Session closed")]
    SessionClosed,
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        CdpError::WebSocket(e.to_string())
    }
}
