use crate::error::LlmError;
use crate::llm::{Backend, ChatRequest, ChunkStream, Completion, CompletionChunk, ToolCallDelta};
use crate::metrics::Usage;
use crate::types::{Message, ToolCall};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

enum Scripted {
    Reply(Message, Option<Usage>),
    Error(String),
}

/// Backend that replays queued responses in order and records every
/// request it receives.
#[derive(Clone)]
pub struct ScriptedBackend {
    responses: Arc<Mutex<Vec<Scripted>>>,
    call_history: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_text_response(&self, content: &str) -> &Self {
        self.push(Scripted::Reply(Message::assistant(content), None))
    }

    pub fn add_text_response_with_usage(&self, content: &str, usage: Usage) -> &Self {
        self.push(Scripted::Reply(Message::assistant(content), Some(usage)))
    }

    /// One assistant turn carrying a tool call per `(id, name, arguments)`.
    pub fn add_tool_calls_response(&self, calls: &[(&str, &str, &str)]) -> &Self {
        let calls = calls
            .iter()
            .map(|(id, name, args)| ToolCall::function(*id, *name, *args))
            .collect();
        self.push(Scripted::Reply(Message::assistant_tool_calls(None, calls), None))
    }

    pub fn add_tool_call_response(&self, tool_name: &str, args: &str) -> &Self {
        self.add_tool_calls_response(&[("test-call-123", tool_name, args)])
    }

    pub fn add_error(&self, error_msg: &str) -> &Self {
        self.push(Scripted::Error(error_msg.to_string()))
    }

    pub fn get_call_history(&self) -> Vec<ChatRequest> {
        self.call_history.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }

    fn push(&self, response: Scripted) -> &Self {
        self.responses.lock().unwrap().push(response);
        self
    }

    fn next(&self, request: &ChatRequest) -> Result<Completion, LlmError> {
        self.call_history.lock().unwrap().push(request.clone());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(LlmError::Backend("No more mock responses configured".to_string()));
        }
        match responses.remove(0) {
            Scripted::Reply(message, usage) => Ok(Completion { message, usage }),
            Scripted::Error(e) => Err(LlmError::Backend(e)),
        }
    }
}

/// Split a completed turn into the chunks a streaming API would send:
/// text word by word, each tool call as a header then two argument halves.
fn into_chunks(completion: Completion) -> Vec<CompletionChunk> {
    let mut chunks: Vec<CompletionChunk> = completion
        .message
        .text()
        .split_inclusive(' ')
        .map(CompletionChunk::text)
        .collect();
    for (index, call) in completion.message.tool_calls.unwrap_or_default().into_iter().enumerate() {
        let args = call.function.arguments;
        let mid = (0..=args.len() / 2).rev().find(|i| args.is_char_boundary(*i)).unwrap_or(0);
        chunks.push(CompletionChunk {
            tool_calls: vec![ToolCallDelta {
                index,
                id: Some(call.id),
                name: Some(call.function.name),
                arguments: Some(args[..mid].to_string()),
            }],
            ..CompletionChunk::default()
        });
        chunks.push(CompletionChunk {
            tool_calls: vec![ToolCallDelta {
                index,
                arguments: Some(args[mid..].to_string()),
                ..ToolCallDelta::default()
            }],
            ..CompletionChunk::default()
        });
    }
    if let Some(usage) = completion.usage {
        chunks.push(CompletionChunk {
            usage: Some(usage),
            ..CompletionChunk::default()
        });
    }
    chunks
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn model(&self) -> String {
        "scripted".to_string()
    }

    async fn complete(&self, request: &ChatRequest) -> Result<Completion, LlmError> {
        self.next(request)
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChunkStream, LlmError> {
        let chunks = into_chunks(self.next(request)?);
        Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
    }
}
