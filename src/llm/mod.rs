//! Model-agnostic LLM layer.
//!
//! A [`Backend`] knows how to talk to one provider. [`Llm`] wraps a backend
//! together with the function registry and runs the tool-call loop on top of
//! it.

pub use self::client::{Llm, LlmOptions};
pub(crate) use self::client::blocking_runtime;
pub use self::openai::{DEFAULT_AZURE_API_VERSION, Endpoint, OpenAiChat};
pub use self::stream::StreamAccumulator;

mod client;
mod openai;
mod stream;

use crate::error::LlmError;
use crate::metrics::Usage;
use crate::types::{Message, ToolChoice, ToolDefinition};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// One request to a backend.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub tool_choice: Option<ToolChoice>,
}

/// A complete assistant turn: either text or tool-call intents.
#[derive(Debug, Clone)]
pub struct Completion {
    pub message: Message,
    pub usage: Option<Usage>,
}

/// Fragment of a tool call inside a streamed response. Fragments sharing an
/// `index` belong to the same call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallDelta {
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionChunk {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallDelta>,
    pub usage: Option<Usage>,
}

impl CompletionChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

pub type ChunkStream = BoxStream<'static, Result<CompletionChunk, LlmError>>;

/// Capabilities every model backend provides.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// Model identifier, for logging and run records.
    fn model(&self) -> String;

    async fn complete(&self, request: &ChatRequest) -> Result<Completion, LlmError>;

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChunkStream, LlmError>;
}
