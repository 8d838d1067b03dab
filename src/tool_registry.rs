use crate::error::ToolError;
use crate::function::{Function, ToolSource};
use crate::types::ToolDefinition;
use std::collections::HashMap;
use tracing::debug;

/// Name-indexed store of the functions available to the model.
///
/// Registration order is kept so the tool list sent to the backend is stable.
/// Registering a name twice replaces the earlier record in place.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: Vec<Function>,
    index: HashMap<String, usize>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: impl Into<ToolSource>) -> &mut Self {
        for function in source.into().into_functions() {
            let name = function.name().to_string();
            match self.index.get(&name) {
                Some(&slot) => {
                    debug!(function = %name, "Replacing registered function");
                    self.functions[slot] = function;
                }
                None => {
                    debug!(function = %name, "Function added to registry");
                    self.index.insert(name, self.functions.len());
                    self.functions.push(function);
                }
            }
        }
        self
    }

    pub fn with(mut self, source: impl Into<ToolSource>) -> Self {
        self.register(source);
        self
    }

    pub fn get(&self, name: &str) -> Result<&Function, ToolError> {
        self.index
            .get(name)
            .map(|&slot| &self.functions[slot])
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Descriptors for the backend's `tools` field, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.functions.iter().map(Function::to_definition).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.functions.iter().map(Function::name).collect()
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
