use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::args::ToolArgs;
use crate::spec::ToolSpec;

/// An LLM requesting execution of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this invocation (used to match results)
    pub id: String,
    /// Tool name to execute
    pub name: String,
    /// Raw JSON arguments as the model emitted them
    pub input: Value,
}

/// Result of executing a tool, sent back to the LLM. Registry execution
/// always produces one of these; failures travel as `is_error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Matches the originating `ToolCall` id
    pub call_id: String,
    /// Serialized JSON payload
    pub content: String,
    pub is_error: bool,
}

/// The extension point: object-safe, Send + Sync, async.
///
/// Implementations receive arguments already coerced against their spec
/// and return a JSON payload; envelope formatting on failure is the
/// registry's job.
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    async fn run(&self, args: ToolArgs) -> Result<Value, ToolError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
