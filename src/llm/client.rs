use super::{Backend, ChatRequest, ChunkStream, Completion, StreamAccumulator};
use crate::budget::DEFAULT_FUNCTION_CALL_LIMIT;
use crate::error::LlmError;
use crate::executor::{RunContext, ToolRound, process_tool_calls};
use crate::function::ToolSource;
use crate::metrics::RunMetrics;
use crate::tool_registry::FunctionRegistry;
use crate::types::{Message, MessageMetrics, ToolChoice};
use futures::{Stream, StreamExt};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct LlmOptions {
    /// Display name; never sent to the backend.
    pub name: Option<String>,
    /// Maximum number of function calls executed per run.
    pub function_call_limit: usize,
    /// Tool choice sent while the budget is active. `None` leaves it to the
    /// backend default.
    pub tool_choice: Option<ToolChoice>,
    /// Execute tool calls before answering. When false the raw assistant turn
    /// is returned.
    pub run_tools: bool,
    /// Prefix answers with the calls that were executed.
    pub show_tool_calls: bool,
    pub system_prompt: Option<String>,
    pub instructions: Vec<String>,
}

impl Default for LlmOptions {
    fn default() -> Self {
        Self {
            name: None,
            function_call_limit: DEFAULT_FUNCTION_CALL_LIMIT,
            tool_choice: None,
            run_tools: true,
            show_tool_calls: false,
            system_prompt: None,
            instructions: Vec::new(),
        }
    }
}

/// A backend plus the functions it may call.
#[derive(Clone)]
pub struct Llm {
    backend: Arc<dyn Backend>,
    registry: FunctionRegistry,
    opts: LlmOptions,
}

impl Llm {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self::from_shared(Arc::new(backend))
    }

    pub fn from_shared(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            registry: FunctionRegistry::new(),
            opts: LlmOptions::default(),
        }
    }

    pub fn with_options(mut self, opts: LlmOptions) -> Self {
        self.opts = opts;
        self
    }

    pub fn with_tool(mut self, tool: impl Into<ToolSource>) -> Self {
        self.add_tool(tool);
        self
    }

    pub fn add_tool(&mut self, tool: impl Into<ToolSource>) {
        self.registry.register(tool);
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn options(&self) -> &LlmOptions {
        &self.opts
    }

    pub fn options_mut(&mut self) -> &mut LlmOptions {
        &mut self.opts
    }

    pub fn model(&self) -> String {
        self.backend.model()
    }

    /// Fresh per-run state sized to this client's call limit.
    pub fn new_run(&self) -> RunContext {
        RunContext::new(self.opts.function_call_limit)
    }

    /// Per-run state for a stored run, seeded with its recorded metrics.
    pub fn resume_run(&self, metrics: RunMetrics) -> RunContext {
        RunContext::resume(self.opts.function_call_limit, metrics)
    }

    /// JSON description stored alongside persisted runs.
    pub fn describe(&self) -> Value {
        let mut desc = json!({
            "name": self.opts.name,
            "model": self.backend.model(),
        });
        if !self.registry.is_empty() {
            let functions: serde_json::Map<String, Value> = self
                .registry
                .functions()
                .iter()
                .map(|f| (f.name().to_string(), json!(f.descriptor())))
                .collect();
            desc["functions"] = Value::Object(functions);
            desc["function_call_limit"] = json!(self.opts.function_call_limit);
        }
        desc
    }

    fn request(&self, messages: &[Message], tool_choice: Option<ToolChoice>) -> ChatRequest {
        let tools = (!self.registry.is_empty()).then(|| self.registry.definitions());
        ChatRequest {
            messages: messages.to_vec(),
            tool_choice: tools.as_ref().and(tool_choice),
            tools,
        }
    }

    fn run_request(&self, messages: &[Message], run: &RunContext) -> ChatRequest {
        self.request(messages, run.budget.tool_choice(self.opts.tool_choice.as_ref()))
    }

    /// Single-shot completion. Tool-call intents are returned, not executed.
    pub async fn invoke(&self, messages: &[Message]) -> Result<Completion, LlmError> {
        let request = self.request(messages, self.opts.tool_choice.clone());
        self.backend.complete(&request).await
    }

    /// Single-shot streaming completion.
    pub async fn invoke_stream(&self, messages: &[Message]) -> Result<ChunkStream, LlmError> {
        let request = self.request(messages, self.opts.tool_choice.clone());
        self.backend.complete_stream(&request).await
    }

    /// Run the tool loop until the model answers in text.
    ///
    /// Every assistant turn and tool message is appended to `messages`.
    pub async fn response(&self, messages: &mut Vec<Message>, run: &mut RunContext) -> Result<String, LlmError> {
        let mut output = String::new();
        loop {
            let request = self.run_request(messages, run);
            debug!(
                messages = request.messages.len(),
                tool_choice = ?request.tool_choice,
                "Sending request to {}",
                self.backend.model()
            );
            let started = Instant::now();
            let completion = self.backend.complete(&request).await?;
            let elapsed = started.elapsed();
            run.metrics.record_response(elapsed, completion.usage.as_ref());

            let assistant = with_time(completion.message, elapsed);
            messages.push(assistant.clone());

            match self.after_turn(&assistant, messages, run) {
                Some(round) => output.push_str(&self.render_executed(&round)),
                None => {
                    output.push_str(assistant.text());
                    return Ok(output);
                }
            }
        }
    }

    /// Streaming variant of [`Llm::response`]. Yields text as it arrives,
    /// across as many backend round trips as the tool loop needs.
    pub fn response_stream<'a>(
        &'a self,
        messages: &'a mut Vec<Message>,
        run: &'a mut RunContext,
    ) -> impl Stream<Item = Result<String, LlmError>> + 'a {
        async_stream::try_stream! {
            loop {
                let request = self.run_request(messages, run);
                let started = Instant::now();
                let mut chunks = self.backend.complete_stream(&request).await?;
                let mut acc = StreamAccumulator::new();
                while let Some(chunk) = chunks.next().await {
                    if let Some(text) = acc.push(chunk?) {
                        yield text;
                    }
                }
                let (message, usage) = acc.finish();
                let elapsed = started.elapsed();
                run.metrics.record_response(elapsed, usage.as_ref());

                let assistant = with_time(message, elapsed);
                messages.push(assistant.clone());

                match self.after_turn(&assistant, messages, run) {
                    Some(round) => {
                        let executed = self.render_executed(&round);
                        if !executed.is_empty() {
                            yield executed;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    /// Decide what follows an assistant turn. Returns the tool round when the
    /// loop should call the backend again, `None` when the turn is final.
    fn after_turn(&self, assistant: &Message, messages: &mut Vec<Message>, run: &mut RunContext) -> Option<ToolRound> {
        let tool_calls = assistant.tool_calls.as_deref().filter(|calls| !calls.is_empty())?;
        if !self.opts.run_tools {
            return None;
        }
        let was_disabled = !run.budget.is_active();
        let round = process_tool_calls(&self.registry, tool_calls, run);
        messages.extend(round.messages.iter().cloned());
        if was_disabled {
            warn!("Model requested tools after the call limit was reached, ending the loop");
            return None;
        }
        Some(round)
    }

    fn render_executed(&self, round: &ToolRound) -> String {
        if !self.opts.show_tool_calls {
            return String::new();
        }
        round
            .executed
            .iter()
            .map(|sig| format!(" - Running: {}\n\n", sig))
            .collect()
    }

    pub fn invoke_blocking(&self, messages: &[Message]) -> Result<Completion, LlmError> {
        blocking_runtime()?.block_on(self.invoke(messages))
    }

    pub fn response_blocking(&self, messages: &mut Vec<Message>, run: &mut RunContext) -> Result<String, LlmError> {
        blocking_runtime()?.block_on(self.response(messages, run))
    }

    /// Drive [`Llm::response_stream`] to completion, handing each delta to
    /// `on_chunk`. Returns the concatenated text.
    pub fn response_stream_blocking(
        &self,
        messages: &mut Vec<Message>,
        run: &mut RunContext,
        mut on_chunk: impl FnMut(&str),
    ) -> Result<String, LlmError> {
        blocking_runtime()?.block_on(async {
            let stream = self.response_stream(messages, run);
            futures::pin_mut!(stream);
            let mut output = String::new();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                on_chunk(&chunk);
                output.push_str(&chunk);
            }
            Ok(output)
        })
    }
}

fn with_time(mut message: Message, elapsed: Duration) -> Message {
    message.metrics = Some(MessageMetrics { time: Some(elapsed) });
    message
}

// Must not be called from inside an async runtime.
pub(crate) fn blocking_runtime() -> Result<tokio::runtime::Runtime, LlmError> {
    Ok(tokio::runtime::Builder::new_current_thread().enable_all().build()?)
}
