use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::AddAssign;
use std::time::Duration;

/// Token counts reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl AddAssign<&Usage> for Usage {
    fn add_assign(&mut self, rhs: &Usage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(rhs.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(rhs.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(rhs.total_tokens);
    }
}

/// Metrics accumulated over a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub tool_call_times: BTreeMap<String, Vec<Duration>>,
    pub response_times: Vec<Duration>,
    pub usage: Usage,
    pub requests: usize,
}

impl RunMetrics {
    pub fn record_tool_call(&mut self, name: &str, elapsed: Duration) {
        self.tool_call_times
            .entry(name.to_string())
            .or_default()
            .push(elapsed);
    }

    pub fn record_response(&mut self, elapsed: Duration, usage: Option<&Usage>) {
        self.requests += 1;
        self.response_times.push(elapsed);
        if let Some(usage) = usage {
            self.usage += usage;
        }
    }

    pub fn tool_calls(&self) -> usize {
        self.tool_call_times.values().map(Vec::len).sum()
    }

    pub fn tool_calls_for(&self, name: &str) -> usize {
        self.tool_call_times.get(name).map_or(0, Vec::len)
    }
}
