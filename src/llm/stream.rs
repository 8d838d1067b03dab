use super::CompletionChunk;
use crate::metrics::Usage;
use crate::types::{Message, ToolCall};
use std::collections::BTreeMap;

/// Folds streamed chunks back into one assistant message.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    content: String,
    tool_calls: BTreeMap<usize, ToolCall>,
    usage: Option<Usage>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one chunk, returning its text delta if it carried any.
    pub fn push(&mut self, chunk: CompletionChunk) -> Option<String> {
        for delta in chunk.tool_calls {
            let entry = self
                .tool_calls
                .entry(delta.index)
                .or_insert_with(|| ToolCall::function(String::new(), String::new(), String::new()));
            if let Some(id) = delta.id {
                entry.id = id;
            }
            if let Some(name) = delta.name {
                entry.function.name = name;
            }
            if let Some(args) = delta.arguments {
                entry.function.arguments.push_str(&args);
            }
        }
        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }
        match chunk.content {
            Some(text) if !text.is_empty() => {
                self.content.push_str(&text);
                Some(text)
            }
            _ => None,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn finish(self) -> (Message, Option<Usage>) {
        let content = (!self.content.is_empty()).then_some(self.content);
        let message = if self.tool_calls.is_empty() {
            Message::assistant(content.unwrap_or_default())
        } else {
            Message::assistant_tool_calls(content, self.tool_calls.into_values().collect())
        };
        (message, self.usage)
    }
}
