//! Anthropic Messages API client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::tools::ToolDefinition;
use crate::Result;

use super::super::message::{ChatResult, ContentBlock, Message, MessageContent, Role, StopReason};
use super::{check_history, http_client, send_json, LlmClient};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const VENDOR: &str = "Anthropic";

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Map<String, Value>,
    },
    #[serde(other)]
    Unsupported,
}

/// Anthropic API client.
pub struct AnthropicClient {
    config: ProviderConfig,
    client: Client,
}

impl AnthropicClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = http_client(config.timeout)?;
        Ok(Self { config, client })
    }

    fn build_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url())
    }

    fn convert_block(block: &ContentBlock) -> Value {
        match block {
            ContentBlock::Text(t) => json!({"type": "text", "text": t.text}),
            ContentBlock::ToolUse(call) => json!({
                "type": "tool_use",
                "id": call.id,
                "name": call.name,
                "input": call.input,
            }),
            ContentBlock::ToolResult(result) => json!({
                "type": "tool_result",
                "tool_use_id": result.tool_use_id,
                "content": result.content,
            }),
        }
    }

    fn convert_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                let content = match &m.content {
                    MessageContent::Text(text) => Value::String(text.clone()),
                    MessageContent::Blocks(blocks) => {
                        Value::Array(blocks.iter().map(Self::convert_block).collect())
                    }
                };
                json!({"role": role, "content": content})
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.input_schema,
                })
            })
            .collect()
    }

    fn build_request(
        &self,
        history: &[Message],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Value {
        let mut request = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": Self::convert_messages(history),
        });

        if !system_prompt.is_empty() {
            request["system"] = json!(system_prompt);
        }
        if !tools.is_empty() {
            request["tools"] = json!(Self::convert_tools(tools));
        }

        request
    }

    fn parse_response(response: MessagesResponse) -> ChatResult {
        let content: Vec<ContentBlock> = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(ContentBlock::text(text)),
                ResponseBlock::ToolUse { id, name, input } => {
                    Some(ContentBlock::tool_use(id, name, input))
                }
                ResponseBlock::Unsupported => None,
            })
            .collect();

        let stop_reason = match response.stop_reason {
            Some(reason) => StopReason::parse(&reason),
            None if content.iter().any(|b| b.as_tool_use().is_some()) => StopReason::ToolUse,
            None => StopReason::EndTurn,
        };

        ChatResult { content, stop_reason }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn chat(
        &self,
        history: &[Message],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<ChatResult> {
        check_history(history, VENDOR)?;

        let request = self.build_request(history, system_prompt, tools);
        debug!("Anthropic request: {} messages, {} tools", history.len(), tools.len());

        let builder = self
            .client
            .post(self.build_url())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request);

        let response: MessagesResponse = send_json(builder, VENDOR).await?;
        Ok(Self::parse_response(response))
    }

    fn model_name(&self) -> String {
        format!("{}/{}", VENDOR, self.config.model)
    }
}
