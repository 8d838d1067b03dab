use crate::error::ToolError;
use crate::function::{Function, Toolkit};
use crate::tool_registry::FunctionRegistry;
use crate::types::{FunctionDescriptor, ToolDefinition};
use serde_json::json;

fn constant(name: &str, value: &'static str) -> Function {
    Function::new(name, format!("Returns {}", value), json!({"type": "object"}), move |_| {
        Ok(value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Arguments;

    #[test]
    fn test_last_registration_wins() {
        let mut registry = FunctionRegistry::new();
        registry.register(constant("answer", "1"));
        registry.register(constant("other", "x"));
        registry.register(constant("answer", "2"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["answer", "other"]);
        let f = registry.get("answer").unwrap();
        assert_eq!(f.call(&Arguments::new()).unwrap(), "2");
    }

    #[test]
    fn test_unknown_name_is_not_found() {
        let registry = FunctionRegistry::new().with(constant("a", "1"));
        let err = registry.get("b").unwrap_err();
        assert_eq!(err, ToolError::NotFound("b".to_string()));
        assert!(!registry.contains("b"));
        assert!(registry.contains("a"));
    }

    #[test]
    fn test_toolkit_and_descriptor_sources_are_normalized() {
        let kit = Toolkit::new("kit").register(constant("x", "1")).register(constant("y", "2"));
        let def = ToolDefinition::function(FunctionDescriptor {
            name: "remote".to_string(),
            description: Some("Runs elsewhere".to_string()),
            parameters: json!({"type": "object", "properties": {}}),
        });
        let registry = FunctionRegistry::new().with(kit).with(def);

        assert_eq!(registry.names(), vec!["x", "y", "remote"]);
        assert!(!registry.get("remote").unwrap().is_callable());
        assert_eq!(registry.definitions().len(), 3);
    }

    #[test]
    fn test_descriptor_round_trip_preserves_schema() {
        let original = crate::tools::calculator()
            .functions()
            .iter()
            .find(|f| f.name() == "divide")
            .cloned()
            .unwrap();

        let wire = serde_json::to_string(&original.to_definition()).unwrap();
        let back: ToolDefinition = serde_json::from_str(&wire).unwrap();
        let restored = Function::from_descriptor(back.function);

        assert_eq!(restored.name(), original.name());
        assert_eq!(restored.description(), original.description());
        assert_eq!(restored.parameters(), original.parameters());
        assert_eq!(restored.descriptor(), original.descriptor());
    }

    #[test]
    fn test_descriptor_can_be_rebound_to_an_entrypoint() {
        let def = ToolDefinition::function(FunctionDescriptor {
            name: "echo".to_string(),
            description: None,
            parameters: json!({"type": "object", "properties": {"text": {"type": "string"}}}),
        });
        let f = Function::from_descriptor_with(def.function, |args| {
            Ok(args.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_string())
        });
        let mut args = Arguments::new();
        args.insert("text".to_string(), json!("hi"));
        assert_eq!(f.call(&args).unwrap(), "hi");
    }
}
