//! LLM client abstraction layer.
//!
//! This module provides:
//! - [`LlmClient`] trait, the single contract every vendor adapter satisfies
//! - [`ProviderRegistry`] for creating an adapter from a [`ProviderConfig`]
//! - Concrete adapters: Anthropic Messages, OpenAI Chat Completions, Gemini
//!
//! Adapters receive the full history on every call and keep no conversation
//! state of their own; they own only an HTTP client and their configuration.
//!
//! # Adding a New Provider
//!
//! 1. Create a new file (e.g., `mistral.rs`)
//! 2. Implement `LlmClient` trait
//! 3. Add a [`ProviderKind`](crate::config::ProviderKind) variant
//! 4. Add to `ProviderRegistry::create()`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::Error;
use crate::tools::ToolDefinition;
use crate::Result;

pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

use super::message::{ChatResult, Message, Role};

/// LLM client trait - swappable provider abstraction.
///
/// Implement this trait to add a new LLM provider.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send the conversation and get the next assistant turn.
    ///
    /// `history` must be non-empty and start with a user turn; it is never modified.
    async fn chat(
        &self,
        history: &[Message],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<ChatResult>;

    /// Human-readable `"<vendor>/<model-id>"` identifier.
    fn model_name(&self) -> String;
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Box<T> {
    async fn chat(
        &self,
        history: &[Message],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<ChatResult> {
        (**self).chat(history, system_prompt, tools).await
    }

    fn model_name(&self) -> String {
        (**self).model_name()
    }
}

/// Provider registry - creates LLM clients dynamically.
///
/// # Example
///
/// ```ignore
/// let config = ProviderConfig::from_env(ProviderKind::OpenAi, None)?;
/// let client = ProviderRegistry::create(config)?;
/// let result = client.chat(&history, "You are helpful.", &tools).await?;
/// ```
pub struct ProviderRegistry;

impl ProviderRegistry {
    /// Create an LLM client from configuration.
    pub fn create(config: ProviderConfig) -> Result<Box<dyn LlmClient>> {
        match config.kind {
            ProviderKind::Anthropic => Ok(Box::new(AnthropicClient::new(config)?)),
            ProviderKind::OpenAi => Ok(Box::new(OpenAiClient::new(config)?)),
            ProviderKind::Gemini => Ok(Box::new(GeminiClient::new(config)?)),
        }
    }

    /// List available provider names.
    pub fn available() -> Vec<&'static str> {
        ProviderKind::ALL.iter().map(|k| k.name()).collect()
    }
}

/// Shared HTTP client with the per-request timeout applied.
pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Reject histories that no vendor accepts.
pub(crate) fn check_history(history: &[Message], vendor: &str) -> Result<()> {
    match history.first() {
        Some(first) if first.role == Role::User => Ok(()),
        Some(_) => Err(Error::Llm(format!("{vendor}: conversation must begin with a user turn"))),
        None => Err(Error::Llm(format!("{vendor}: conversation is empty"))),
    }
}

/// Send a request and decode the JSON body, mapping every failure to an `Llm` error
/// that names the vendor.
///
/// Transport errors have their URL stripped so nothing carried in it reaches logs.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    vendor: &str,
) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::Llm(format!("{vendor} request failed: {}", e.without_url())))?;

    let status = response.status();
    debug!("{} responded with {}", vendor, status);

    let body = response
        .text()
        .await
        .map_err(|e| {
            Error::Llm(format!("{vendor} response could not be read: {}", e.without_url()))
        })?;

    if !status.is_success() {
        return Err(Error::Llm(format!("{vendor} API error ({status}): {body}")));
    }

    serde_json::from_str(&body)
        .map_err(|e| Error::Llm(format!("Malformed {vendor} response: {e}")))
}

/// Decode tool-call arguments into a mapping.
///
/// Vendors send either an object, nothing, or a JSON-encoded string of an object.
pub(crate) fn arguments_to_map(value: Value, vendor: &str) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        Value::String(encoded) if encoded.trim().is_empty() => Ok(Map::new()),
        Value::String(encoded) => match serde_json::from_str::<Value>(&encoded) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(Error::Llm(format!(
                "Malformed {vendor} response: tool arguments must be an object, got {other}"
            ))),
            Err(e) => Err(Error::Llm(format!(
                "Malformed {vendor} response: undecodable tool arguments: {e}"
            ))),
        },
        other => Err(Error::Llm(format!(
            "Malformed {vendor} response: tool arguments must be an object, got {other}"
        ))),
    }
}

/// One `chat` call as seen by [`ScriptedClient`].
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct ScriptedRequest {
    pub history: Vec<Message>,
    pub system_prompt: String,
    pub tools: Vec<ToolDefinition>,
}

/// Scripted LLM client for testing.
#[cfg(test)]
pub struct ScriptedClient {
    responses: std::sync::Mutex<std::collections::VecDeque<ChatResult>>,
    fallback: Option<ChatResult>,
    seen: std::sync::Mutex<Vec<ScriptedRequest>>,
}

#[cfg(test)]
impl ScriptedClient {
    /// Replay the given results in order; fails once they run out.
    pub fn new(responses: Vec<ChatResult>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            fallback: None,
            seen: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Return the same result on every call.
    pub fn repeating(response: ChatResult) -> Self {
        Self {
            responses: std::sync::Mutex::new(Default::default()),
            fallback: Some(response),
            seen: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Number of chat calls made so far.
    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Everything passed to `chat`, one entry per call.
    pub fn requests(&self) -> Vec<ScriptedRequest> {
        self.seen.lock().unwrap().clone()
    }

    /// History snapshots received, one per call.
    pub fn histories(&self) -> Vec<Vec<Message>> {
        self.requests().into_iter().map(|r| r.history).collect()
    }
}

#[cfg(test)]
#[async_trait]
impl LlmClient for ScriptedClient {
    async fn chat(
        &self,
        history: &[Message],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<ChatResult> {
        self.seen.lock().unwrap().push(ScriptedRequest {
            history: history.to_vec(),
            system_prompt: system_prompt.to_string(),
            tools: tools.to_vec(),
        });
        let next = self.responses.lock().unwrap().pop_front();
        next.or_else(|| self.fallback.clone())
            .ok_or_else(|| Error::Llm("No more scripted responses".to_string()))
    }

    fn model_name(&self) -> String {
        "Scripted/fake-model".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::loop_impl::{AgentLoop, Outcome};
    use crate::agent::message::{ContentBlock, MessageContent};
    use crate::tools::{DummyTool, ToolRunner};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_scripted_client() {
        let client =
            ScriptedClient::new(vec![ChatResult::text("Hello!"), ChatResult::text("World!")]);
        let history = vec![Message::user("hi")];

        let first = client.chat(&history, "Be brief.", &[]).await.unwrap();
        assert_eq!(first.joined_text(), "Hello!");

        let second = client.chat(&history, "", &[]).await.unwrap();
        assert_eq!(second.joined_text(), "World!");

        assert!(client.chat(&history, "", &[]).await.is_err());
        assert_eq!(client.calls(), 3);
        assert_eq!(client.requests()[0].system_prompt, "Be brief.");
        assert!(client.requests()[1].system_prompt.is_empty());
    }

    #[test]
    fn test_check_history() {
        assert!(check_history(&[Message::user("hi")], "Test").is_ok());
        assert!(check_history(&[], "Test").is_err());
        let starts_with_assistant = vec![Message::assistant(vec![ContentBlock::text("hi")])];
        assert!(check_history(&starts_with_assistant, "Test").is_err());
    }

    #[test]
    fn test_arguments_to_map() {
        let map = arguments_to_map(json!({"a": 1}), "Test").unwrap();
        assert_eq!(map["a"], 1);

        let map = arguments_to_map(json!("{\"directory\": \"./proj\"}"), "Test").unwrap();
        assert_eq!(map["directory"], "./proj");

        assert!(arguments_to_map(json!(""), "Test").unwrap().is_empty());
        assert!(arguments_to_map(Value::Null, "Test").unwrap().is_empty());
        assert!(arguments_to_map(json!("[1, 2]"), "Test").is_err());
        assert!(arguments_to_map(json!("{oops"), "Test").is_err());
        assert!(arguments_to_map(json!(42), "Test").is_err());
    }

    #[test]
    fn test_registry_creates_each_provider() {
        for kind in ProviderKind::ALL {
            let config = ProviderConfig::new(kind, kind.default_model(), "key");
            let client = ProviderRegistry::create(config).unwrap();
            let expected = format!("{}/{}", kind.vendor(), kind.default_model());
            assert_eq!(client.model_name(), expected);
        }
        assert_eq!(ProviderRegistry::available(), vec!["anthropic", "openai", "gemini"]);
    }

    /// Vendor payloads for: one `list_files` call, then the final answer.
    fn scripted_vendor_bodies(kind: ProviderKind) -> (Value, Value) {
        match kind {
            ProviderKind::Anthropic => (
                json!({
                    "content": [{"type": "tool_use", "id": "toolu_1", "name": "list_files",
                                 "input": {"directory": "./proj"}}],
                    "stop_reason": "tool_use"
                }),
                json!({
                    "content": [{"type": "text", "text": "Found 2 files."}],
                    "stop_reason": "end_turn"
                }),
            ),
            ProviderKind::OpenAi => (
                json!({
                    "choices": [{"message": {"role": "assistant", "content": null, "tool_calls": [{
                        "id": "call_1", "type": "function",
                        "function": {
                            "name": "list_files",
                            "arguments": "{\"directory\":\"./proj\"}"
                        }
                    }]}, "finish_reason": "tool_calls"}]
                }),
                json!({
                    "choices": [{"message": {"role": "assistant", "content": "Found 2 files."},
                                 "finish_reason": "stop"}]
                }),
            ),
            ProviderKind::Gemini => (
                json!({
                    "candidates": [{"content": {"role": "model", "parts": [
                        {"functionCall": {"name": "list_files", "args": {"directory": "./proj"}}}
                    ]}}]
                }),
                json!({
                    "candidates": [{
                        "content": {"role": "model", "parts": [{"text": "Found 2 files."}]},
                        "finishReason": "STOP"
                    }]
                }),
            ),
        }
    }

    fn endpoint_path(kind: ProviderKind) -> &'static str {
        match kind {
            ProviderKind::Anthropic => "/v1/messages",
            ProviderKind::OpenAi => "/v1/chat/completions",
            ProviderKind::Gemini => "/v1beta/models/gemini-2.5-pro:generateContent",
        }
    }

    #[tokio::test]
    async fn test_adapters_are_interchangeable_in_loop() {
        for kind in ProviderKind::ALL {
            let server = MockServer::start().await;
            let (tool_call, answer) = scripted_vendor_bodies(kind);
            Mock::given(method("POST"))
                .and(path(endpoint_path(kind)))
                .respond_with(ResponseTemplate::new(200).set_body_json(tool_call))
                .up_to_n_times(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path(endpoint_path(kind)))
                .respond_with(ResponseTemplate::new(200).set_body_json(answer))
                .mount(&server)
                .await;

            let config = ProviderConfig::new(kind, kind.default_model(), "test-key")
                .with_host(server.uri());
            let client = ProviderRegistry::create(config).unwrap();

            let mut tools = ToolRunner::new();
            tools.register(DummyTool {
                name: "list_files".to_string(),
                result: "a.tsx\nb.tsx".to_string(),
            });

            let report = AgentLoop::new(client, tools)
                .with_max_iterations(15)
                .run("list project files", "./proj")
                .await
                .unwrap();

            let expected = Outcome::Completed("Found 2 files.".to_string());
            assert_eq!(report.outcome, expected, "{kind}");
            assert_eq!(report.iterations, 2, "{kind}");

            let messages = report.conversation.messages();
            assert_eq!(messages.len(), 4, "{kind}");
            assert_eq!(messages[3].role, Role::Assistant);
            let request = messages[1].tool_uses()[0].clone();
            assert_eq!(request.name, "list_files");
            assert_eq!(request.input["directory"], "./proj");
            let result = messages[2].tool_result_blocks()[0].clone();
            assert_eq!(result.tool_use_id, request.id);
            assert_eq!(result.content, "a.tsx\nb.tsx");
            assert!(matches!(messages[2].content, MessageContent::Blocks(_)));

            assert_eq!(server.received_requests().await.unwrap().len(), 2, "{kind}");
        }
    }
}
