//! Run-scoped conversation driver on top of [`Llm`].
//!
//! An [`Assistant`] owns one [`Run`]: it resumes the run from storage,
//! builds the system prompt, replays recent history into each request and
//! writes the run back once the model has answered.

use crate::executor::RunContext;
use crate::knowledge::KnowledgeBase;
use crate::llm::{Llm, blocking_runtime};
use crate::run::Run;
use crate::storage::RunStorage;
use crate::types::Message;
use anyhow::Result;
use chrono::Local;
use futures::{Stream, StreamExt};
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_NUM_HISTORY_MESSAGES: usize = 6;

#[derive(Debug, Clone)]
pub struct AssistantOptions {
    pub name: Option<String>,
    pub description: Option<String>,
    pub instructions: Vec<String>,
    pub add_datetime_to_instructions: bool,
    /// Ask the model to format answers as markdown.
    pub markdown: bool,
    /// Replay earlier messages of the run into each request.
    pub add_chat_history: bool,
    pub num_history_messages: usize,
    pub user_id: Option<String>,
    /// Resume this run instead of starting a new one.
    pub run_id: Option<String>,
}

impl Default for AssistantOptions {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            instructions: Vec::new(),
            add_datetime_to_instructions: false,
            markdown: false,
            add_chat_history: true,
            num_history_messages: DEFAULT_NUM_HISTORY_MESSAGES,
            user_id: None,
            run_id: None,
        }
    }
}

pub struct Assistant {
    llm: Llm,
    opts: AssistantOptions,
    storage: Option<Arc<dyn RunStorage>>,
    knowledge: Option<KnowledgeBase>,
    run: Run,
    // Call budget and metrics for the whole run, across every answer.
    ctx: RunContext,
    started: bool,
}

impl Assistant {
    pub fn new(llm: Llm, opts: AssistantOptions) -> Self {
        let run = match &opts.run_id {
            Some(id) => Run::with_id(id.clone(), opts.user_id.as_deref()),
            None => Run::new(opts.user_id.as_deref()),
        };
        let ctx = llm.new_run();
        Self {
            llm,
            opts,
            storage: None,
            knowledge: None,
            run,
            ctx,
            started: false,
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn RunStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Attach a knowledge base and expose it as `search_knowledge_base`.
    pub fn with_knowledge(mut self, knowledge: KnowledgeBase) -> Self {
        self.llm.add_tool(knowledge.search_function());
        self.knowledge = Some(knowledge);
        self
    }

    pub fn llm(&self) -> &Llm {
        &self.llm
    }

    pub fn run_id(&self) -> &str {
        &self.run.run_id
    }

    pub fn current_run(&self) -> &Run {
        &self.run
    }

    /// Call budget and metrics of the current run.
    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Leave the current run and start a fresh one for the same user. The
    /// call budget and metrics start over with it.
    pub fn new_run(&mut self) -> &str {
        self.run = Run::new(self.opts.user_id.as_deref());
        self.ctx.reset();
        self.started = false;
        &self.run.run_id
    }

    /// Resume the run from storage, or create and store it. Idempotent.
    pub fn start(&mut self) -> Result<&str> {
        if self.started {
            return Ok(&self.run.run_id);
        }
        if let Some(storage) = &self.storage {
            match storage.read(&self.run.run_id)? {
                Some(existing) => {
                    info!(run_id = %existing.run_id, messages = existing.messages.len(), "Resumed run");
                    self.ctx = self.llm.resume_run(existing.metrics.clone());
                    self.run = existing;
                }
                None => {
                    self.run.set_name(self.opts.name.as_deref());
                    self.run.set_llm(self.llm.describe());
                    storage.upsert(&self.run)?;
                    info!(run_id = %self.run.run_id, "Created run");
                }
            }
        }
        self.started = true;
        Ok(&self.run.run_id)
    }

    /// The system prompt for every request, if there is anything to say.
    ///
    /// A system prompt configured on the LLM replaces the generated one.
    pub fn system_prompt(&self) -> Option<String> {
        if let Some(prompt) = &self.llm.options().system_prompt {
            return Some(prompt.clone());
        }

        let mut instructions: Vec<String> = self.opts.instructions.clone();
        instructions.extend(self.llm.options().instructions.iter().cloned());
        if self.knowledge.is_some() {
            instructions.push(
                "Search your knowledge base using `search_knowledge_base` before answering questions it may cover."
                    .to_string(),
            );
        }
        if self.opts.markdown {
            instructions.push("Use markdown to format your answers.".to_string());
        }
        if self.opts.add_datetime_to_instructions {
            instructions.push(format!(
                "The current time is {}",
                Local::now().format("%Y-%m-%d %H:%M:%S")
            ));
        }

        let mut prompt = String::new();
        if let Some(description) = &self.opts.description {
            prompt.push_str(description);
            prompt.push('\n');
        }
        if !instructions.is_empty() {
            if !prompt.is_empty() {
                prompt.push('\n');
            }
            prompt.push_str("## Instructions\n");
            for instruction in &instructions {
                prompt.push_str(&format!("- {}\n", instruction));
            }
        }
        let prompt = prompt.trim_end().to_string();
        (!prompt.is_empty()).then_some(prompt)
    }

    /// System prompt, replayed history, then the new user message.
    pub fn build_messages(&self, input: &str) -> Vec<Message> {
        let mut messages = Vec::new();
        if let Some(prompt) = self.system_prompt() {
            messages.push(Message::system(prompt));
        }
        if self.opts.add_chat_history {
            messages.extend(self.run.history(Some(self.opts.num_history_messages)));
        }
        messages.push(Message::user(input));
        messages
    }

    pub async fn run(&mut self, input: &str) -> Result<String> {
        self.start()?;
        let mut messages = self.build_messages(input);
        let first_new = messages.len() - 1;
        debug!(run_id = %self.run.run_id, calls = self.ctx.budget.count(), "Running assistant");
        let output = self.llm.response(&mut messages, &mut self.ctx).await?;
        self.finish(messages.split_off(first_new))?;
        Ok(output)
    }

    /// Streaming variant of [`Assistant::run`]. The run is stored once the
    /// stream is exhausted.
    pub fn run_stream<'a>(&'a mut self, input: &str) -> impl Stream<Item = Result<String>> + 'a {
        let input = input.to_string();
        async_stream::try_stream! {
            self.start()?;
            let mut messages = self.build_messages(&input);
            let first_new = messages.len() - 1;
            {
                let chunks = self.llm.response_stream(&mut messages, &mut self.ctx);
                futures::pin_mut!(chunks);
                while let Some(chunk) = chunks.next().await {
                    yield chunk?;
                }
            }
            self.finish(messages.split_off(first_new))?;
        }
    }

    pub async fn print_response(&mut self, input: &str, stream: bool) -> Result<()> {
        if stream {
            let chunks = self.run_stream(input);
            futures::pin_mut!(chunks);
            let mut stdout = io::stdout();
            while let Some(chunk) = chunks.next().await {
                write!(stdout, "{}", chunk?)?;
                stdout.flush()?;
            }
            writeln!(stdout)?;
        } else {
            let output = self.run(input).await?;
            println!("{}", output);
        }
        Ok(())
    }

    pub fn run_blocking(&mut self, input: &str) -> Result<String> {
        blocking_runtime()?.block_on(self.run(input))
    }

    fn finish(&mut self, new_messages: Vec<Message>) -> Result<()> {
        self.run.extend_messages(new_messages);
        self.run.set_metrics(self.ctx.metrics.clone());
        self.run.set_llm(self.llm.describe());
        if let Some(storage) = &self.storage {
            storage.upsert(&self.run)?;
            debug!(run_id = %self.run.run_id, "Run saved");
        }
        Ok(())
    }
}
