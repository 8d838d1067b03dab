//! Tool-calling LLM assistants.
//!
//! The core is the function-call loop in [`llm::Llm`]: model tool-call
//! intents are resolved against a [`tool_registry::FunctionRegistry`],
//! executed under a per-run [`budget::CallBudget`] and folded back into the
//! conversation until the model answers in text.

pub mod assistant;
pub mod budget;
pub mod config;
pub mod embedding;
pub mod error;
pub mod executor;
pub mod function;
pub mod knowledge;
pub mod llm;
pub mod metrics;
pub mod run;
pub mod storage;
pub mod tool_registry;
pub mod tools;
pub mod types;
pub mod utils;

#[cfg(test)]
mod mocks;
#[cfg(test)]
mod tests;

pub use assistant::{Assistant, AssistantOptions};
pub use error::{LlmError, StorageError, ToolError};
pub use executor::RunContext;
pub use function::{Function, FunctionCall, Toolkit, ToolSource};
pub use llm::{Llm, LlmOptions};
pub use types::{Message, Role, ToolChoice};
