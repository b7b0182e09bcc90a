//! Tools module - agent capabilities
//!
//! Tools are external actions the agent can take: reading and listing
//! project files, writing new files, searching the web and fetching pages.

mod runner;
mod filesystem;
mod web;

pub use runner::{ToolRunner, ToolDefinition};
pub use filesystem::{ListFilesTool, ReadFileTool, WriteFileTool};
pub use web::{FetchUrlTool, SearchWebTool};

use async_trait::async_trait;
use serde_json::Value;
use crate::Result;
use crate::error::Error;

/// Marker appended to any output that was cut short
pub const TRUNCATION_MARKER: &str = "\n\n... [truncated]";

/// Tool trait - interface for all agent tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name used in function calls
    fn name(&self) -> &str;

    /// Description of what the tool does
    fn description(&self) -> &str;

    /// JSON Schema for parameters
    fn parameters(&self) -> Value;

    /// Execute the tool with given parameters
    async fn execute(&self, params: Value) -> Result<String>;

    /// Convert to tool definition for LLM
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters(),
        }
    }
}

/// Cut `text` to at most `max_chars` characters, appending [`TRUNCATION_MARKER`] when cut.
pub fn truncate_output(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Fetch a required string argument
pub(crate) fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Tool(format!("Missing '{}' parameter", key)))
}

/// Fixed-output tool for testing
#[cfg(test)]
pub struct DummyTool {
    pub name: String,
    pub result: String,
}

#[cfg(test)]
#[async_trait]
impl Tool for DummyTool {
    fn name(&self) -> &str { &self.name }
    fn description(&self) -> &str { "Dummy tool for testing" }
    fn parameters(&self) -> Value { serde_json::json!({"type": "object"}) }

    async fn execute(&self, _params: Value) -> Result<String> {
        Ok(self.result.clone())
    }
}
