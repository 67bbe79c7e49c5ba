//! # web2api Engine
//!
//! Turns a chat website into a completion stream:
//!
//! - [`workflow`] replays a site's configured steps against a page
//! - [`stream`] samples the reply region and emits only new text
//! - [`request`] keeps one request per browser session, newest wins
//! - [`engine`] ties them together behind [`WebEngine::execute_workflow`]

pub mod chunk;
pub mod cookies;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod locator;
pub mod request;
pub mod signal;
pub mod stream;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use chunk::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChunkFormatter, ErrorBody,
    ErrorEnvelope, MessageContent, StreamChunk, build_prompt,
};
pub use cookies::{CookieStore, JsonCookieStore};
pub use engine::{ChunkStream, EngineSettings, WebEngine, WorkflowRequest};
pub use error::EngineError;
pub use extractor::{Extractor, RegionSnapshot};
pub use locator::Locator;
pub use request::{RequestContext, RequestManager, RequestRecord, RequestStatus};
pub use signal::{StopChecker, StopSignal};
pub use stream::{ChunkSink, Observation, StreamContext, StreamEnd, StreamMonitor, StreamOutcome};
pub use workflow::{StepContext, WorkflowExecutor};
