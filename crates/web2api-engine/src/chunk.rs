//! OpenAI-compatible wire types and SSE chunk rendering.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(MessageContent::Text(content.into())),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn text(&self) -> String {
        self.content
            .as_ref()
            .map(MessageContent::as_text)
            .unwrap_or_default()
    }
}

/// Message content (text or parts).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// Content part (text or image). Images are not forwarded to the site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: serde_json::Value },
}

/// Flatten a conversation into the single prompt typed into the site.
///
/// One message is sent as-is; several become `Role: content` blocks.
pub fn build_prompt(messages: &[ChatMessage]) -> String {
    match messages {
        [] => String::new(),
        [only] => only.text(),
        many => many
            .iter()
            .map(|m| format!("{}: {}", capitalize(&m.role), m.text()))
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

fn capitalize(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Chat completion request.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: Option<bool>,
}

/// `{"message","type","code"}` error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: String,
}

impl From<&EngineError> for ErrorBody {
    fn from(e: &EngineError) -> Self {
        Self {
            message: e.to_string(),
            error_type: e.error_type().to_string(),
            code: e.code().to_string(),
        }
    }
}

/// `{"error": {...}}` envelope for non-streaming failures.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl From<&EngineError> for ErrorEnvelope {
    fn from(e: &EngineError) -> Self {
        Self { error: e.into() }
    }
}

/// One unit produced by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Delta(String),
    Error(ErrorBody),
    /// Always the last unit of a stream.
    Finish,
}

#[derive(Serialize)]
struct ChunkFrame<'a> {
    id: &'a str,
    object: &'static str,
    created: i64,
    model: &'a str,
    choices: [StreamChoice<'a>; 1],
}

#[derive(Serialize)]
struct StreamChoice<'a> {
    index: u32,
    delta: Delta<'a>,
    finish_reason: Option<&'static str>,
}

#[derive(Serialize)]
struct Delta<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
}

#[derive(Serialize)]
struct ErrorFrame<'a> {
    id: &'a str,
    object: &'static str,
    created: i64,
    model: &'a str,
    error: &'a ErrorBody,
}

const CHUNK_OBJECT: &str = "chat.completion.chunk";

/// Renders [`StreamChunk`]s as server-sent events for one completion.
#[derive(Debug, Clone)]
pub struct ChunkFormatter {
    id: String,
    created: i64,
    model: String,
}

impl ChunkFormatter {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
            created: chrono::Utc::now().timestamp(),
            model: model.into(),
        }
    }

    pub fn with_id(id: impl Into<String>, created: i64, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created,
            model: model.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// SSE payload for one chunk, including the `data: ` prefix and blank line.
    pub fn format(&self, chunk: &StreamChunk) -> String {
        match chunk {
            StreamChunk::Delta(text) => self.frame(Some(text), None),
            StreamChunk::Finish => {
                let mut out = self.frame(None, Some("stop"));
                out.push_str("data: [DONE]\n\n");
                out
            }
            StreamChunk::Error(body) => {
                let frame = ErrorFrame {
                    id: &self.id,
                    object: CHUNK_OBJECT,
                    created: self.created,
                    model: &self.model,
                    error: body,
                };
                sse(&frame)
            }
        }
    }

    fn frame(&self, content: Option<&str>, finish_reason: Option<&'static str>) -> String {
        let frame = ChunkFrame {
            id: &self.id,
            object: CHUNK_OBJECT,
            created: self.created,
            model: &self.model,
            choices: [StreamChoice {
                index: 0,
                delta: Delta { content },
                finish_reason,
            }],
        };
        sse(&frame)
    }
}

fn sse<T: Serialize>(value: &T) -> String {
    // Plain structs of strings and numbers always serialize.
    let json = serde_json::to_string(value).unwrap_or_default();
    format!("data: {}\n\n", json)
}

/// Non-streaming completion.
#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

#[derive(Debug, Serialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: &'static str,
}

/// Token usage, estimated at four characters per token.
#[derive(Debug, Serialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl ChatCompletionResponse {
    pub fn new(model: impl Into<String>, prompt: &str, content: String) -> Self {
        let prompt_tokens = estimate_tokens(prompt);
        let completion_tokens = estimate_tokens(&content);
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
            object: "chat.completion",
            created: chrono::Utc::now().timestamp(),
            model: model.into(),
            choices: vec![Choice {
                index: 0,
                message: ChatMessage::new("assistant", content),
                finish_reason: "stop",
            }],
            usage: Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
        }
    }
}

fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

#[cfg(test)]
#[path = "chunk_tests.rs"]
mod tests;
