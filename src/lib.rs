//! uxagent - UI/UX research agent
//!
//! This library provides the agent orchestration layer: one chat contract over
//! several LLM vendors, a bounded tool-calling loop, and the project and web
//! tools the agent works with.

pub mod agent;
pub mod tools;
pub mod config;
pub mod error;
pub mod ui;

pub use error::{Error, Result};
