use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use crate::args::coerce_args;
use crate::spec::ToolSpec;
use crate::tool::{Tool, ToolCall, ToolResult};

/// Holds the registered tools and executes calls against them.
///
/// `execute` is total: unknown tools, bad arguments, and tool failures all
/// come back as an error `ToolResult` the model can read and react to. The
/// orchestrating loop never has to unwind over a bad tool call.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Duplicate names are a startup bug, not a runtime
    /// condition, so they error instead of overwriting.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        let spec = tool.spec();
        if self.tools.contains_key(&spec.name) {
            return Err(RegistryError::DuplicateName(spec.name));
        }
        self.tools.insert(spec.name, Arc::new(tool));
        Ok(())
    }

    /// Specs of every registered tool, for LLM binding.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute one call. Never fails: every outcome is a `ToolResult`
    /// carrying the call id, with failures in the
    /// `{"success": false, "error": ...}` envelope.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(tool = %call.name, "unknown tool requested");
            return error_result(&call.id, format!("unknown tool '{}'", call.name));
        };

        let args = match coerce_args(&tool.spec(), &call.input) {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "argument coercion failed");
                return error_result(&call.id, e.to_string());
            }
        };

        debug!(tool = %call.name, call_id = %call.id, "executing tool");
        match tool.run(args).await {
            Ok(payload) => ToolResult {
                call_id: call.id.clone(),
                content: payload.to_string(),
                is_error: false,
            },
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool execution failed");
                error_result(&call.id, e.to_string())
            }
        }
    }
}

fn error_result(call_id: &str, error: String) -> ToolResult {
    ToolResult {
        call_id: call_id.to_string(),
        content: json!({"success": false, "error": error}).to_string(),
        is_error: true,
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateName(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::ToolArgs;
    use crate::spec::{ParamKind, ParamSpec};
    use crate::tool::ToolError;
    use async_trait::async_trait;
    use serde_json::Value;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "echo".to_string(),
                description: "Echoes back the message.".to_string(),
                params: vec![ParamSpec::required(
                    "message",
                    ParamKind::Text,
                    "The message to echo back",
                )],
            }
        }

        async fn run(&self, args: ToolArgs) -> Result<Value, ToolError> {
            Ok(json!({"success": true, "message": args.text("message")?}))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "broken".to_string(),
                description: "Always fails.".to_string(),
                params: vec![],
            }
        }

        async fn run(&self, _args: ToolArgs) -> Result<Value, ToolError> {
            Err(ToolError::ExecutionFailed("backend unavailable".to_string()))
        }
    }

    fn call(name: &str, input: Value) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            input,
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();
        assert!(matches!(
            registry.register(EchoTool),
            Err(RegistryError::DuplicateName(_))
        ));
    }

    #[tokio::test]
    async fn successful_call_carries_payload_and_id() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();

        let result = registry.execute(&call("echo", json!({"message": "hi"}))).await;
        assert_eq!(result.call_id, "call_1");
        assert!(!result.is_error);
        let payload: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(payload["message"], "hi");
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_result() {
        let registry = ToolRegistry::new();
        let result = registry.execute(&call("nope", json!({}))).await;
        assert!(result.is_error);
        let payload: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(payload["success"], false);
        assert!(payload["error"].as_str().unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn coercion_failure_is_an_error_result() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();
        let result = registry.execute(&call("echo", json!({}))).await;
        assert!(result.is_error);
        let payload: Value = serde_json::from_str(&result.content).unwrap();
        assert!(payload["error"].as_str().unwrap().contains("message"));
    }

    #[tokio::test]
    async fn tool_failure_is_an_error_result_not_a_panic() {
        let mut registry = ToolRegistry::new();
        registry.register(FailingTool).unwrap();
        let result = registry.execute(&call("broken", json!({}))).await;
        assert!(result.is_error);
        let payload: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(payload["success"], false);
        assert!(payload["error"].as_str().unwrap().contains("backend unavailable"));
    }

    #[test]
    fn specs_lists_registered_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();
        registry.register(FailingTool).unwrap();
        let mut names: Vec<String> = registry.specs().into_iter().map(|s| s.name).collect();
        names.sort();
        assert_eq!(names, ["broken", "echo"]);
    }
}
