//! OpenAI Chat Completions client.
//!
//! The system prompt travels as a leading `system` message, tool results as
//! `tool` role messages correlated by `tool_call_id`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::Error;
use crate::tools::ToolDefinition;
use crate::Result;

use super::super::message::{ChatResult, ContentBlock, Message, MessageContent, Role, StopReason};
use super::{arguments_to_map, check_history, http_client, send_json, LlmClient};

const VENDOR: &str = "OpenAI";

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    id: String,
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// OpenAI API client.
pub struct OpenAiClient {
    config: ProviderConfig,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = http_client(config.timeout)?;
        Ok(Self { config, client })
    }

    fn build_url(&self) -> String {
        format!("{}/v1/chat/completions", self.config.base_url())
    }

    fn convert_messages(system_prompt: &str, messages: &[Message]) -> Vec<Value> {
        let mut converted = vec![json!({"role": "system", "content": system_prompt})];

        for message in messages {
            let blocks = match &message.content {
                MessageContent::Text(text) => {
                    let role = match message.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    };
                    converted.push(json!({"role": role, "content": text}));
                    continue;
                }
                MessageContent::Blocks(blocks) => blocks,
            };

            let text: String = blocks.iter().filter_map(ContentBlock::as_text).collect();

            match message.role {
                Role::User => {
                    if !text.is_empty() {
                        converted.push(json!({"role": "user", "content": text}));
                    }
                    for result in blocks.iter().filter_map(ContentBlock::as_tool_result) {
                        converted.push(json!({
                            "role": "tool",
                            "tool_call_id": result.tool_use_id,
                            "content": result.content,
                        }));
                    }
                }
                Role::Assistant => {
                    let tool_calls: Vec<Value> = blocks
                        .iter()
                        .filter_map(ContentBlock::as_tool_use)
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": Value::Object(call.input.clone()).to_string(),
                                }
                            })
                        })
                        .collect();

                    let content = if text.is_empty() { Value::Null } else { Value::String(text) };
                    let mut assistant = json!({"role": "assistant", "content": content});
                    if !tool_calls.is_empty() {
                        assistant["tool_calls"] = Value::Array(tool_calls);
                    }
                    converted.push(assistant);
                }
            }
        }

        converted
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    }
                })
            })
            .collect()
    }

    fn parse_response(response: CompletionResponse) -> Result<ChatResult> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Llm(format!("Malformed {VENDOR} response: no choices")))?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            content.push(ContentBlock::text(text));
        }

        for call in choice.message.tool_calls {
            let input = arguments_to_map(call.function.arguments, VENDOR)?;
            content.push(ContentBlock::tool_use(call.id, call.function.name, input));
        }

        let stop_reason = if content.iter().any(|b| b.as_tool_use().is_some()) {
            StopReason::ToolUse
        } else {
            StopReason::EndTurn
        };

        Ok(ChatResult { content, stop_reason })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(
        &self,
        history: &[Message],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<ChatResult> {
        check_history(history, VENDOR)?;

        let mut request = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": Self::convert_messages(system_prompt, history),
        });
        if !tools.is_empty() {
            request["tools"] = json!(Self::convert_tools(tools));
        }

        debug!("OpenAI request: {} messages, {} tools", history.len(), tools.len());

        let builder = self
            .client
            .post(self.build_url())
            .bearer_auth(&self.config.api_key)
            .json(&request);

        let response: CompletionResponse = send_json(builder, VENDOR).await?;
        Self::parse_response(response)
    }

    fn model_name(&self) -> String {
        format!("{}/{}", VENDOR, self.config.model)
    }
}
