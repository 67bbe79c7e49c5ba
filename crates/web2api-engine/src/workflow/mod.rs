//! Declarative workflow replay.
//!
//! A site's workflow is a list of steps (`WAIT`, `KEY_PRESS`, `CLICK`,
//! `FILL_INPUT`, `STREAM_WAIT`) executed strictly in order against one page.

mod executor;
mod input;

pub use executor::{StepContext, WorkflowExecutor};
