//! Tool runner - manages and executes tools

use std::time::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use crate::Result;
use crate::error::Error;
use super::Tool;
use super::filesystem::{ReadFileTool, WriteFileTool, ListFilesTool};
use super::web::{SearchWebTool, FetchUrlTool};

/// Default ceiling for a single tool call
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Tool definition for LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Tool runner manages registered tools and executes them.
///
/// Tools are kept in registration order so the catalog sent to the model is stable.
pub struct ToolRunner {
    tools: Vec<Box<dyn Tool>>,
    timeout: Duration,
}

impl ToolRunner {
    /// Create an empty tool runner
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Create a tool runner with the project and web tools
    pub fn with_defaults() -> Self {
        let mut runner = Self::new();

        // File tools
        runner.register(ReadFileTool);
        runner.register(ListFilesTool);
        runner.register(WriteFileTool);

        // Web tools
        runner.register(SearchWebTool::new());
        runner.register(FetchUrlTool::new());

        runner
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(Box::new(tool));
    }

    /// Get tool definitions for LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// Execute a tool by name.
    ///
    /// Fails with [`Error::UnknownTool`] for unregistered names and
    /// [`Error::Timeout`] when the call outlives the configured timeout.
    pub async fn execute(&self, name: &str, params: Value) -> Result<String> {
        let tool = self.tools.iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| Error::UnknownTool(name.to_string()))?;

        debug!("Dispatching tool {} (timeout {:?})", name, self.timeout);

        match tokio::time::timeout(self.timeout, tool.execute(params)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                what: format!("tool '{}'", name),
                after: self.timeout,
            }),
        }
    }

    /// Check if a tool exists
    pub fn has(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name() == name)
    }

    /// List registered tool names
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }
}

impl Default for ToolRunner {
    fn default() -> Self {
        Self::new()
    }
}
