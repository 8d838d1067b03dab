//! Function records and the tool sources they are built from.
//!
//! Every tool handed to the LLM layer, whether a closure, a typed function, a
//! [`Toolkit`] or a bare [`ToolDefinition`], is normalized into a
//! [`Function`] when it is registered. Nothing downstream inspects the
//! original shape again.

use crate::types::{FunctionDescriptor, ToolDefinition};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Parsed tool arguments: always a JSON object.
pub type Arguments = Map<String, Value>;

type Entrypoint = Arc<dyn Fn(&Arguments) -> anyhow::Result<String> + Send + Sync>;

/// A named, schema-described capability the model may invoke.
#[derive(Clone)]
pub struct Function {
    descriptor: FunctionDescriptor,
    entrypoint: Option<Entrypoint>,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.descriptor.name)
            .field("callable", &self.entrypoint.is_some())
            .finish_non_exhaustive()
    }
}

impl Function {
    /// Build a function from an explicit JSON schema and a closure over the
    /// raw argument object.
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, parameters: Value, f: F) -> Self
    where
        F: Fn(&Arguments) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self {
            descriptor: FunctionDescriptor {
                name: name.into(),
                description: Some(description.into()),
                parameters,
            },
            entrypoint: Some(Arc::new(f)),
        }
    }

    /// Build a function whose arguments deserialize into `A`. The parameter
    /// schema is derived from `A`.
    pub fn typed<A, F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        A: DeserializeOwned + schemars::JsonSchema,
        F: Fn(A) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        let name = name.into();
        let fn_name = name.clone();
        Self::new(name, description, parameters_schema::<A>(), move |args| {
            let parsed: A = serde_json::from_value(Value::Object(args.clone()))
                .map_err(|e| anyhow::anyhow!("Invalid arguments for {}: {}", fn_name, e))?;
            f(parsed)
        })
    }

    /// A schema-only function. It is advertised to the model but executing it
    /// yields an error result.
    pub fn from_descriptor(descriptor: FunctionDescriptor) -> Self {
        Self {
            descriptor,
            entrypoint: None,
        }
    }

    /// Attach an entrypoint to a previously serialized descriptor.
    pub fn from_descriptor_with<F>(descriptor: FunctionDescriptor, f: F) -> Self
    where
        F: Fn(&Arguments) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self {
            descriptor,
            entrypoint: Some(Arc::new(f)),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn description(&self) -> Option<&str> {
        self.descriptor.description.as_deref()
    }

    pub fn parameters(&self) -> &Value {
        &self.descriptor.parameters
    }

    pub fn is_callable(&self) -> bool {
        self.entrypoint.is_some()
    }

    pub fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::function(self.descriptor.clone())
    }

    /// Invoke the entrypoint. Errors and panics raised by the tool body are
    /// returned as `Err(text)`.
    pub fn call(&self, args: &Arguments) -> Result<String, String> {
        let Some(entrypoint) = &self.entrypoint else {
            return Err(crate::error::ToolError::MissingEntrypoint(self.name().to_string()).to_string());
        };
        match catch_unwind(AssertUnwindSafe(|| entrypoint(args))) {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(format!("{:#}", e)),
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(format!("Function {} panicked: {}", self.name(), reason))
            }
        }
    }
}

/// JSON schema for an argument struct, without the draft metadata the chat
/// APIs reject.
pub fn parameters_schema<A: schemars::JsonSchema>() -> Value {
    let schema = schemars::schema_for!(A);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| json!({"type": "object"}));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.entry("properties").or_insert_with(|| json!({}));
    }
    value
}

/// One argument-bound invocation of a [`Function`].
#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub function: Function,
    pub arguments: Arguments,
    pub call_id: Option<String>,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl FunctionCall {
    pub fn new(function: Function, arguments: Arguments, call_id: Option<String>) -> Self {
        Self {
            function,
            arguments,
            call_id,
            result: None,
            error: None,
        }
    }

    /// Run the function, storing either the result or the error text.
    /// Returns true on success.
    pub fn execute(&mut self) -> bool {
        match self.function.call(&self.arguments) {
            Ok(output) => {
                self.result = Some(output);
                self.error = None;
                true
            }
            Err(e) => {
                self.result = None;
                self.error = Some(e);
                false
            }
        }
    }

    /// The text folded back into the conversation for this call.
    pub fn output(&self) -> String {
        match (&self.result, &self.error) {
            (Some(result), _) => result.clone(),
            (None, Some(error)) => format!("Error: {}", error),
            (None, None) => String::new(),
        }
    }

    /// `name(arg=value, ...)`, used when showing tool calls to the user.
    pub fn signature(&self) -> String {
        let args = self
            .arguments
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.function.name(), args)
    }
}

/// A named group of functions registered together.
#[derive(Debug, Clone, Default)]
pub struct Toolkit {
    name: String,
    functions: Vec<Function>,
}

impl Toolkit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    /// Add a function; a later function with the same name replaces the
    /// earlier one.
    pub fn register(mut self, function: Function) -> Self {
        match self.functions.iter_mut().find(|f| f.name() == function.name()) {
            Some(existing) => *existing = function,
            None => self.functions.push(function),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn into_functions(self) -> Vec<Function> {
        self.functions
    }
}

/// Every shape a tool can be handed to the LLM layer in.
#[derive(Debug, Clone)]
pub enum ToolSource {
    Function(Function),
    Toolkit(Toolkit),
    Descriptor(ToolDefinition),
}

impl ToolSource {
    /// Normalize into function records.
    pub fn into_functions(self) -> Vec<Function> {
        match self {
            ToolSource::Function(f) => vec![f],
            ToolSource::Toolkit(kit) => kit.into_functions(),
            ToolSource::Descriptor(def) => vec![Function::from_descriptor(def.function)],
        }
    }
}

impl From<Function> for ToolSource {
    fn from(f: Function) -> Self {
        ToolSource::Function(f)
    }
}

impl From<Toolkit> for ToolSource {
    fn from(kit: Toolkit) -> Self {
        ToolSource::Toolkit(kit)
    }
}

impl From<ToolDefinition> for ToolSource {
    fn from(def: ToolDefinition) -> Self {
        ToolSource::Descriptor(def)
    }
}
