//! Browser layer for web2api.
//!
//! Drives Chrome over the DevTools Protocol and manages the browsers and
//! tabs the engine runs on.
//!
//! ```text
//! ┌──────────────┐  lease   ┌──────────────┐  lease  ┌──────────────┐
//! │ BrowserPool  │ ───────► │ ChromeInstance│ ──────► │  TabManager  │ ──► PageSession
//! │ (launcher)   │          │ (CdpClient)   │         │ (per session)│     (PageDriver)
//! └──────────────┘          └──────────────┘         └──────────────┘
//! ```
//!
//! The engine only sees the [`PageDriver`] trait.

pub mod cdp;
mod driver;
mod error;
mod launcher;
mod pool;
mod tabs;

pub use cdp::{CdpClient, CdpError, Cookie, PageSession};
pub use driver::{BoundingBox, ElementHandle, PageDriver};
pub use error::BrowserError;
pub use launcher::{ChromeInstance, ChromeLauncher};
pub use pool::{BrowserPool, Lease, PoolSettings, ResourceFactory, ResourcePool};
pub use tabs::{CdpTabFactory, TabManager};
