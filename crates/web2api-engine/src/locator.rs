//! Element lookup with selector fallbacks.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};
use web2api_browser::{ElementHandle, PageDriver};
use web2api_config::{InputConfig, SiteConfig};

use crate::error::EngineError;
use crate::signal::StopSignal;

/// Resolves logical targets to elements on a page.
pub struct Locator<'a> {
    site: &'a SiteConfig,
    timeout: Duration,
    poll: Duration,
}

impl<'a> Locator<'a> {
    pub fn new(site: &'a SiteConfig, input: &InputConfig) -> Self {
        Self {
            site,
            timeout: input.locate_timeout(),
            poll: input.locate_poll(),
        }
    }

    /// Selectors for `target`, primary first.
    pub fn candidates(&self, target: &str) -> Vec<String> {
        self.site.selectors_for(target)
    }

    /// First element matching any candidate, retried until the locate
    /// timeout. `Ok(None)` when nothing appeared.
    pub async fn find(
        &self,
        page: &dyn PageDriver,
        target: &str,
        stop: &StopSignal,
    ) -> Result<Option<ElementHandle>, EngineError> {
        let candidates = self.candidates(target);
        if candidates.is_empty() {
            debug!("No selectors configured for '{}'", target);
            return Ok(None);
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            for selector in &candidates {
                match page.query(selector).await {
                    Ok(Some(element)) => {
                        trace!("'{}' matched '{}'", target, selector);
                        return Ok(Some(element));
                    }
                    Ok(None) => {}
                    Err(e) => trace!("Query '{}' failed: {}", selector, e),
                }
            }

            if Instant::now() >= deadline {
                debug!("'{}' not found within {:?}", target, self.timeout);
                return Ok(None);
            }
            if !stop.sleep(self.poll).await {
                return Err(EngineError::Cancelled);
            }
        }
    }
}
