//! Agent module - core agent logic.
//!
//! This module contains:
//! - Message types shared by the loop and every provider
//! - LLM client trait and the vendor implementations
//! - Agent loop driving model calls and tool execution
//! - Prompt material (system prompt, seed message)
//!
//! # Adding a New LLM Provider
//!
//! See [`llm::ProviderRegistry`] for instructions.

mod context;
mod loop_impl;
mod message;

// LLM providers in submodule
pub mod llm;

// Re-exports for convenience
pub use context::{seed_message, system_prompt, DEFAULT_TASK};
pub use llm::{AnthropicClient, GeminiClient, LlmClient, OpenAiClient, ProviderRegistry};
pub use loop_impl::{run_agent, AgentLoop, Outcome, RunReport, DEFAULT_MAX_ITERATIONS};
pub use message::{
    ChatResult, ContentBlock, Conversation, Message, MessageContent, Role, StopReason, TextBlock,
    ToolResultBlock, ToolUseBlock,
};
