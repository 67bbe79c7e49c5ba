//! Cookie access for CDP page session.

use serde_json::json;
use tracing::debug;

use crate::cdp::error::CdpError;
use crate::cdp::protocol::Cookie;

use super::core::PageSession;

impl PageSession {
    /// Cookies visible to the current page.
    pub async fn get_cookies(&self) -> Result<Vec<Cookie>, CdpError> {
        let result = self.call("Network.getCookies", None).await?;

        let cookies: Vec<Cookie> = serde_json::from_value(result["cookies"].clone())?;
        Ok(cookies.into_iter().map(Cookie::normalized).collect())
    }

    /// Install cookies into the browser profile.
    pub async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), CdpError> {
        if cookies.is_empty() {
            return Ok(());
        }

        self.call("Network.setCookies", Some(json!({ "cookies": cookies })))
            .await?;

        debug!("Restored {} cookies", cookies.len());
        Ok(())
    }
}
