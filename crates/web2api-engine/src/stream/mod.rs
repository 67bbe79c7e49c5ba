//! Reply streaming: snapshot diffing and completion detection.

mod context;
mod monitor;

pub use context::{Observation, StreamContext};
pub use monitor::StreamMonitor;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::chunk::StreamChunk;

/// Receives reply text as it is discovered.
#[async_trait]
pub trait ChunkSink: Send + Sync {
    /// Forward one delta. Returns `false` once nobody is listening.
    async fn send_delta(&self, text: String) -> bool;
}

#[async_trait]
impl ChunkSink for mpsc::Sender<StreamChunk> {
    async fn send_delta(&self, text: String) -> bool {
        self.send(StreamChunk::Delta(text)).await.is_ok()
    }
}

/// Why the response loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Completed,
    Cancelled,
    TimedOut,
}

/// Result of monitoring one reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOutcome {
    pub end: StreamEnd,
    /// Characters forwarded to the sink.
    pub emitted_chars: usize,
}
