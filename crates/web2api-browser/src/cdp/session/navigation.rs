//! Navigation operations for CDP page session.

use std::time::{Duration, Instant};

use serde_json::json;
use tracing::debug;

use crate::cdp::error::CdpError;

use super::core::PageSession;

const LOAD_TIMEOUT: Duration = Duration::from_secs(30);
const LOAD_POLL: Duration = Duration::from_millis(100);

impl PageSession {
    /// Navigate to URL and wait until the document is interactive.
    pub async fn navigate(&self, url: &str) -> Result<(), CdpError> {
        let result = self
            .call("Page.navigate", Some(json!({"url": url})))
            .await?;

        if let Some(error) = result.get("errorText").and_then(|e| e.as_str()) {
            return Err(CdpError::NavigationFailed(format!("{}: {}", url, error)));
        }

        self.wait_for_load().await?;

        debug!("Navigated to {}", url);
        Ok(())
    }

    /// Poll `document.readyState` until it is interactive or complete.
    pub async fn wait_for_load(&self) -> Result<(), CdpError> {
        let start = Instant::now();

        loop {
            // Evaluation can fail transiently while the old document is torn down.
            if let Ok(result) = self.evaluate("document.readyState").await {
                if matches!(result.as_str(), Some("complete" | "interactive")) {
                    return Ok(());
                }
            }

            if start.elapsed() > LOAD_TIMEOUT {
                return Err(CdpError::Timeout("Page load timeout".to_string()));
            }

            tokio::time::sleep(LOAD_POLL).await;
        }
    }

    /// Current URL of the page.
    pub async fn get_url(&self) -> Result<String, CdpError> {
        let result = self.evaluate("window.location.href").await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }
}
