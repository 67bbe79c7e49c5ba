//! Chrome DevTools Protocol (CDP) client implementation.
//!
//! One WebSocket per browser process; pages are driven through flattened
//! sessions (`Target.attachToTarget` with `flatten: true`) that share it.
//!
//! ```rust,ignore
//! let client = CdpClient::connect("http://localhost:9222").await?;
//! let page = client.new_page(None).await?;
//! page.navigate("https://example.com").await?;
//! ```

mod client;
mod error;
mod protocol;
mod session;

pub use client::CdpClient;
pub use error::CdpError;
pub use protocol::*;
pub use session::{KeyDefinition, PageSession};
