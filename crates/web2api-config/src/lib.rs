//! # web2api Config
//!
//! Configuration management for web2api: engine tuning, browser pool sizing
//! and the per-site automation profiles the engine replays.

mod error;
mod loader;
mod schema;
mod store;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use store::{SiteStore, StaticSiteStore};
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
