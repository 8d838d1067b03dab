//! Turns tool-call intents into executed function calls and tool messages.

use crate::budget::CallBudget;
use crate::error::ToolError;
use crate::function::{Arguments, FunctionCall};
use crate::metrics::RunMetrics;
use crate::tool_registry::FunctionRegistry;
use crate::types::{Message, ToolCall};
use serde_json::Value;
use std::time::Instant;
use tracing::{info, warn};

/// Tool message content for calls dropped because the budget ran out.
pub const DECLINED_CALL_MESSAGE: &str =
    "Function call limit reached for this run; this call was not executed.";

/// State owned by exactly one run: the call budget and its metrics.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub budget: CallBudget,
    pub metrics: RunMetrics,
}

impl RunContext {
    pub fn new(function_call_limit: usize) -> Self {
        Self {
            budget: CallBudget::new(function_call_limit),
            metrics: RunMetrics::default(),
        }
    }

    /// Context for a stored run picked up again: its metrics carry on and
    /// the calls they record count against the budget.
    pub fn resume(function_call_limit: usize, metrics: RunMetrics) -> Self {
        Self {
            budget: CallBudget::resumed(function_call_limit, metrics.tool_calls()),
            metrics,
        }
    }

    /// Forget everything; used when a new run starts.
    pub fn reset(&mut self) {
        self.budget.reset();
        self.metrics = RunMetrics::default();
    }
}

/// Outcome of answering one batch of tool-call intents.
#[derive(Debug, Default)]
pub struct ToolRound {
    /// One tool message per intent, in intent order.
    pub messages: Vec<Message>,
    /// Signatures of the calls that actually ran.
    pub executed: Vec<String>,
}

pub fn parse_arguments(name: &str, raw: &str) -> Result<Arguments, ToolError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Arguments::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Arguments::new()),
        Ok(other) => Err(ToolError::InvalidArguments {
            name: name.to_string(),
            reason: format!("expected a JSON object, got {}", other),
        }),
        Err(e) => Err(ToolError::InvalidArguments {
            name: name.to_string(),
            reason: e.to_string(),
        }),
    }
}

pub fn resolve_tool_call(registry: &FunctionRegistry, tool_call: &ToolCall) -> Result<FunctionCall, ToolError> {
    let name = &tool_call.function.name;
    let function = registry.get(name)?;
    let arguments = parse_arguments(name, &tool_call.function.arguments)?;
    Ok(FunctionCall::new(function.clone(), arguments, Some(tool_call.id.clone())))
}

/// Execute already-resolved calls in order, subject to the budget.
pub fn run_function_calls(calls: Vec<FunctionCall>, run: &mut RunContext) -> Vec<Message> {
    calls.into_iter().map(|call| admit(call, run).0).collect()
}

/// Answer every intent of one model response with a tool message.
///
/// Unknown functions and undecodable arguments are reported without counting
/// against the budget. Calls arriving after the budget is exhausted are
/// declined.
pub fn process_tool_calls(registry: &FunctionRegistry, tool_calls: &[ToolCall], run: &mut RunContext) -> ToolRound {
    let mut round = ToolRound::default();
    for tool_call in tool_calls {
        match resolve_tool_call(registry, tool_call) {
            Ok(call) => {
                let (message, signature) = admit(call, run);
                round.executed.extend(signature);
                round.messages.push(message);
            }
            Err(e) => {
                warn!(function = %tool_call.function.name, error = %e, "Tool call could not be resolved");
                round.messages.push(Message::tool(
                    tool_call.id.clone(),
                    tool_call.function.name.clone(),
                    e.to_string(),
                    None,
                ));
            }
        }
    }
    round
}

fn admit(mut call: FunctionCall, run: &mut RunContext) -> (Message, Option<String>) {
    let call_id = call.call_id.clone().unwrap_or_default();
    let name = call.function.name().to_string();

    if !run.budget.is_active() {
        warn!(function = %name, limit = run.budget.limit(), "Declining tool call, budget exhausted");
        return (Message::tool(call_id, name, DECLINED_CALL_MESSAGE, None), None);
    }

    let signature = call.signature();
    info!(call = %signature, "Running function");
    let started = Instant::now();
    let ok = call.execute();
    let elapsed = started.elapsed();
    if !ok {
        warn!(function = %name, error = ?call.error, "Function returned an error");
    }

    let message = Message::tool(call_id, name.clone(), call.output(), Some(elapsed));
    run.metrics.record_tool_call(&name, elapsed);
    run.budget.record(call);
    (message, Some(signature))
}
