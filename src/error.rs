//! Error types for uxagent

use std::time::Duration;

use thiserror::Error;

/// Result type alias for uxagent operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in uxagent
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential for {provider}: set the {var} environment variable")]
    MissingCredential { provider: String, var: String },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether the loop may feed this error back to the model instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Tool(_) | Error::UnknownTool(_))
    }
}
