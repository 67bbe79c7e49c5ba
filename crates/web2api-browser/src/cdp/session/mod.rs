//! CDP page session for interacting with a single page.

mod core;
mod dom;
mod input;
mod js;
mod navigation;
mod network;

pub use self::core::PageSession;
pub use self::input::KeyDefinition;
