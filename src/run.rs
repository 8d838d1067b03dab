use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::metrics::RunMetrics;
use crate::types::{Message, Role};

/// Persisted state of one conversation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Run {
    pub run_id: String,
    pub user_id: Option<String>,
    pub name: Option<String>,
    /// Description of the LLM that served the run.
    pub llm: Option<Value>,
    pub messages: Vec<Message>,
    pub metrics: RunMetrics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    pub fn new(user_id: Option<&str>) -> Run {
        Self::with_id(Uuid::new_v4().to_string(), user_id)
    }

    pub fn with_id(run_id: impl Into<String>, user_id: Option<&str>) -> Run {
        let now = Utc::now();
        Run {
            run_id: run_id.into(),
            user_id: user_id.map(|s| s.to_string()),
            name: None,
            llm: None,
            messages: Vec::new(),
            metrics: RunMetrics::default(),
            created_at: now,
            updated_at: now,
        }
    }

    // Append one message
    pub fn add_message(&mut self, msg: Message) {
        self.messages.push(msg);
        self.updated_at = Utc::now();
    }

    pub fn extend_messages(&mut self, msgs: impl IntoIterator<Item = Message>) {
        self.messages.extend(msgs);
        self.updated_at = Utc::now();
    }

    pub fn set_name(&mut self, name: Option<&str>) {
        self.name = name.map(|s| s.to_string());
        self.updated_at = Utc::now();
    }

    pub fn set_llm(&mut self, llm: Value) {
        self.llm = Some(llm);
        self.updated_at = Utc::now();
    }

    pub fn set_metrics(&mut self, metrics: RunMetrics) {
        self.metrics = metrics;
        self.updated_at = Utc::now();
    }

    /// Messages worth replaying into a new request: everything except system
    /// prompts, limited to the last `limit` entries when given.
    ///
    /// The cut never starts on a tool message, which would be orphaned from
    /// the assistant turn that requested it.
    pub fn history(&self, limit: Option<usize>) -> Vec<Message> {
        let replayable: Vec<&Message> = self.messages.iter().filter(|m| m.role != Role::System).collect();
        let mut start = limit.map_or(0, |n| replayable.len().saturating_sub(n));
        while start < replayable.len() && replayable[start].role == Role::Tool {
            start += 1;
        }
        replayable[start..].iter().map(|m| (*m).clone()).collect()
    }

    /// (user, assistant) text pairs in order, for display.
    pub fn chat_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut pending: Option<String> = None;
        for m in &self.messages {
            match m.role {
                Role::User => pending = Some(m.text().to_string()),
                Role::Assistant if !m.has_tool_calls() => {
                    if let Some(user) = pending.take() {
                        pairs.push((user, m.text().to_string()));
                    }
                }
                _ => {}
            }
        }
        pairs
    }
}
