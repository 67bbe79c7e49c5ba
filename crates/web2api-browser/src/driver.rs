//! Page driver abstraction.
//!
//! The engine talks to a page only through [`PageDriver`], so workflows can
//! be exercised against a scripted fake as well as a live CDP session.

use async_trait::async_trait;
use serde_json::Value;

use crate::cdp::{Cookie, PageSession};
use crate::error::BrowserError;

/// A located element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    /// Selector the element was found by.
    pub selector: String,
    pub node_id: i64,
}

/// Element geometry in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Operations the automation engine performs against one page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait until the document is interactive.
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Evaluate a script and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError>;

    /// First element matching `selector`.
    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, BrowserError>;

    /// Move the mouse to the element centre and click it.
    async fn click(&self, element: &ElementHandle) -> Result<(), BrowserError>;

    async fn focus(&self, element: &ElementHandle) -> Result<(), BrowserError>;

    /// `None` when the element is not rendered.
    async fn bounding_box(
        &self,
        element: &ElementHandle,
    ) -> Result<Option<BoundingBox>, BrowserError>;

    async fn insert_text(&self, text: &str) -> Result<(), BrowserError>;

    /// Press a key or combo such as `Enter` or `Control+a`.
    async fn press_key(&self, key: &str) -> Result<(), BrowserError>;

    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), BrowserError>;

    async fn get_cookies(&self) -> Result<Vec<Cookie>, BrowserError>;

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), BrowserError>;
}

#[async_trait]
impl PageDriver for PageSession {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.navigate(url).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.get_url().await?)
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        Ok(PageSession::evaluate(self, script).await?)
    }

    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, BrowserError> {
        let node_id = self.query_selector(selector).await?;
        Ok(node_id.map(|node_id| ElementHandle {
            selector: selector.to_string(),
            node_id,
        }))
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        let bbox = PageDriver::bounding_box(self, element).await?.ok_or_else(|| {
            BrowserError::ActionFailed(format!("'{}' is not rendered", element.selector))
        })?;
        let (x, y) = bbox.center();
        PageSession::mouse_move(self, x, y).await?;
        PageSession::click(self, x, y).await?;
        Ok(())
    }

    async fn focus(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.focus_node(element.node_id).await?;
        Ok(())
    }

    async fn bounding_box(
        &self,
        element: &ElementHandle,
    ) -> Result<Option<BoundingBox>, BrowserError> {
        let Some(model) = self.get_box_model(element.node_id).await? else {
            return Ok(None);
        };
        let quad = &model.content;
        if quad.len() < 8 {
            return Ok(None);
        }
        let (cx, cy) = PageSession::quad_center(quad);
        let width = model.width as f64;
        let height = model.height as f64;
        Ok(Some(BoundingBox {
            x: cx - width / 2.0,
            y: cy - height / 2.0,
            width,
            height,
        }))
    }

    async fn insert_text(&self, text: &str) -> Result<(), BrowserError> {
        Ok(PageSession::insert_text(self, text).await?)
    }

    async fn press_key(&self, key: &str) -> Result<(), BrowserError> {
        Ok(PageSession::press_key(self, key).await?)
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), BrowserError> {
        Ok(PageSession::mouse_move(self, x, y).await?)
    }

    async fn get_cookies(&self) -> Result<Vec<Cookie>, BrowserError> {
        Ok(PageSession::get_cookies(self).await?)
    }

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), BrowserError> {
        Ok(PageSession::set_cookies(self, cookies).await?)
    }
}
