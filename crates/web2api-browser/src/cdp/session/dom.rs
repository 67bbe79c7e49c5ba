//! DOM operations for CDP page session.

use serde_json::json;

use crate::cdp::error::CdpError;
use crate::cdp::protocol::BoxModel;

use super::core::PageSession;

/// `DOM.getBoxModel` fails with this code for detached or display:none nodes.
const NO_LAYOUT_CODE: i64 = -32000;

impl PageSession {
    /// Node id of the document root.
    async fn document_node_id(&self) -> Result<i64, CdpError> {
        let result = self
            .call("DOM.getDocument", Some(json!({"depth": 0})))
            .await?;

        result["root"]["nodeId"]
            .as_i64()
            .ok_or_else(|| CdpError::InvalidResponse("Missing root nodeId".to_string()))
    }

    /// First node matching `selector`, if any.
    pub async fn query_selector(&self, selector: &str) -> Result<Option<i64>, CdpError> {
        let root = self.document_node_id().await?;

        let result = self
            .call(
                "DOM.querySelector",
                Some(json!({
                    "nodeId": root,
                    "selector": selector,
                })),
            )
            .await?;

        let node_id = result["nodeId"].as_i64().unwrap_or(0);
        if node_id == 0 {
            Ok(None)
        } else {
            Ok(Some(node_id))
        }
    }

    /// Box model for a node, `None` when it has no layout.
    pub async fn get_box_model(&self, node_id: i64) -> Result<Option<BoxModel>, CdpError> {
        let result = self
            .call("DOM.getBoxModel", Some(json!({"nodeId": node_id})))
            .await;

        match result {
            Ok(r) => {
                let model: BoxModel = serde_json::from_value(r["model"].clone())?;
                Ok(Some(model))
            }
            Err(CdpError::Protocol {
                code: NO_LAYOUT_CODE,
                ..
            }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Give keyboard focus to a node.
    pub async fn focus_node(&self, node_id: i64) -> Result<(), CdpError> {
        self.call("DOM.focus", Some(json!({"nodeId": node_id})))
            .await?;
        Ok(())
    }

    /// Centre point of a content quad (`[x1, y1, ..., x4, y4]`).
    pub(crate) fn quad_center(quad: &[f64]) -> (f64, f64) {
        if quad.len() < 8 {
            return (0.0, 0.0);
        }
        let x = (quad[0] + quad[2] + quad[4] + quad[6]) / 4.0;
        let y = (quad[1] + quad[3] + quad[5] + quad[7]) / 4.0;
        (x, y)
    }
}
