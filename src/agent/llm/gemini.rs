//! Gemini LLM client implementation (API key authentication).
//!
//! Gemini has no call-id concept: tool results are correlated by function
//! name and position, so results must be sent back in request order.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::config::ProviderConfig;
use crate::error::Error;
use crate::tools::ToolDefinition;
use crate::Result;

use super::super::message::{ChatResult, ContentBlock, Message, MessageContent, Role, StopReason};
use super::{arguments_to_map, check_history, http_client, send_json, LlmClient};

const VENDOR: &str = "Google";

/// Prefix of ids made up locally for calls Gemini sent without one
const LOCAL_ID_PREFIX: &str = "gemini_";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

/// Gemini API client using API key authentication.
pub struct GeminiClient {
    config: ProviderConfig,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = http_client(config.timeout)?;
        Ok(Self { config, client })
    }

    fn build_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url(),
            self.config.model
        )
    }

    /// Ids Gemini issued itself go back on the wire; local ones do not.
    fn vendor_id(id: &str) -> Option<&str> {
        (!id.is_empty() && !id.starts_with(LOCAL_ID_PREFIX)).then_some(id)
    }

    fn convert_part(block: &ContentBlock) -> Value {
        match block {
            ContentBlock::Text(t) => json!({"text": t.text}),
            ContentBlock::ToolUse(call) => {
                let mut function_call = json!({
                    "name": call.name,
                    "args": call.input,
                });
                if let Some(id) = Self::vendor_id(&call.id) {
                    function_call["id"] = json!(id);
                }
                json!({"functionCall": function_call})
            }
            ContentBlock::ToolResult(result) => {
                let mut function_response = json!({
                    "name": result.tool_name,
                    "response": {"result": result.content},
                });
                if let Some(id) = Self::vendor_id(&result.tool_use_id) {
                    function_response["id"] = json!(id);
                }
                json!({"functionResponse": function_response})
            }
        }
    }

    fn convert_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                let parts: Vec<Value> = match &m.content {
                    MessageContent::Text(text) => vec![json!({"text": text})],
                    MessageContent::Blocks(blocks) => {
                        blocks.iter().map(Self::convert_part).collect()
                    }
                };
                json!({"role": role, "parts": parts})
            })
            .collect()
    }

    /// Gemini's schema dialect uses upper-case type names; anything it
    /// cannot express is sent as an opaque string.
    fn convert_property_type(schema_type: Option<&str>) -> &'static str {
        match schema_type {
            Some("string") => "STRING",
            Some("integer") => "INTEGER",
            Some("number") => "NUMBER",
            Some("boolean") => "BOOLEAN",
            _ => "STRING",
        }
    }

    fn convert_schema(schema: &Value) -> Value {
        let mut properties = Map::new();
        if let Some(props) = schema.get("properties").and_then(Value::as_object) {
            for (name, prop) in props {
                let mut converted = Map::new();
                converted.insert(
                    "type".to_string(),
                    json!(Self::convert_property_type(prop.get("type").and_then(Value::as_str))),
                );
                if let Some(description) = prop.get("description") {
                    converted.insert("description".to_string(), description.clone());
                }
                properties.insert(name.clone(), Value::Object(converted));
            }
        }

        let required = schema.get("required").cloned().unwrap_or_else(|| json!([]));
        json!({
            "type": "OBJECT",
            "properties": properties,
            "required": required,
        })
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Option<Value> {
        if tools.is_empty() {
            return None;
        }

        let function_declarations: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": Self::convert_schema(&t.input_schema),
                })
            })
            .collect();

        Some(json!([{
            "functionDeclarations": function_declarations
        }]))
    }

    fn parse_response(response: GenerateResponse) -> Result<ChatResult> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::Llm(format!("Malformed {VENDOR} response: no candidates")))?;

        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        let mut content = Vec::new();
        let mut has_function_calls = false;

        for part in parts {
            if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                content.push(ContentBlock::text(text));
            }

            if let Some(fc) = part.function_call {
                has_function_calls = true;
                let id = fc
                    .id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| {
                        format!("{}{}_{}", LOCAL_ID_PREFIX, fc.name, Uuid::new_v4().simple())
                    });
                let input = arguments_to_map(fc.args, VENDOR)?;
                content.push(ContentBlock::tool_use(id, fc.name, input));
            }
        }

        let stop_reason = if has_function_calls {
            StopReason::ToolUse
        } else {
            StopReason::EndTurn
        };

        Ok(ChatResult { content, stop_reason })
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn chat(
        &self,
        history: &[Message],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<ChatResult> {
        check_history(history, VENDOR)?;

        let mut request = json!({
            "contents": Self::convert_messages(history),
            "generationConfig": {
                "maxOutputTokens": self.config.max_tokens
            }
        });

        if !system_prompt.is_empty() {
            request["systemInstruction"] = json!({
                "parts": [{"text": system_prompt}]
            });
        }

        if let Some(tool_config) = Self::convert_tools(tools) {
            request["tools"] = tool_config;
        }

        debug!("Gemini request: {} messages, {} tools", history.len(), tools.len());

        let builder = self
            .client
            .post(self.build_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request);

        let response: GenerateResponse = send_json(builder, VENDOR).await?;
        Self::parse_response(response)
    }

    fn model_name(&self) -> String {
        format!("{}/{}", VENDOR, self.config.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::ToolResultBlock;
    use crate::config::ProviderKind;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GeminiClient {
        let config = ProviderConfig::new(ProviderKind::Gemini, "gemini-test", "g-key")
            .with_host(server.uri());
        GeminiClient::new(config).unwrap()
    }

    fn parse(body: Value) -> Result<ChatResult> {
        GeminiClient::parse_response(serde_json::from_value(body).unwrap())
    }

    #[test]
    fn test_convert_schema_upper_cases_and_degrades() {
        let schema = json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string", "description": "Path"},
                "limit": {"type": "integer"},
                "ratio": {"type": "number"},
                "recursive": {"type": "boolean"},
                "tags": {"type": "array", "items": {"type": "string"}},
                "untyped": {}
            },
            "required": ["file_path"]
        });

        let converted = GeminiClient::convert_schema(&schema);
        assert_eq!(converted["type"], "OBJECT");
        assert_eq!(
            converted["properties"]["file_path"],
            json!({"type": "STRING", "description": "Path"})
        );
        assert_eq!(converted["properties"]["limit"]["type"], "INTEGER");
        assert_eq!(converted["properties"]["ratio"]["type"], "NUMBER");
        assert_eq!(converted["properties"]["recursive"]["type"], "BOOLEAN");
        assert_eq!(converted["properties"]["tags"]["type"], "STRING");
        assert_eq!(converted["properties"]["untyped"]["type"], "STRING");
        assert_eq!(converted["required"], json!(["file_path"]));
    }

    #[test]
    fn test_convert_messages_correlates_by_name() {
        let mut input = Map::new();
        input.insert("query".to_string(), json!("bento grid"));
        let history = vec![
            Message::user("research layouts"),
            Message::assistant(vec![
                ContentBlock::text("Searching."),
                ContentBlock::tool_use("gemini_search_web_1", "search_web", input),
            ]),
            Message::tool_results(vec![ToolResultBlock {
                tool_use_id: "gemini_search_web_1".to_string(),
                tool_name: "search_web".to_string(),
                content: "**Bento**".to_string(),
            }]),
        ];

        let converted = GeminiClient::convert_messages(&history);
        assert_eq!(
            converted[0],
            json!({"role": "user", "parts": [{"text": "research layouts"}]})
        );
        assert_eq!(converted[1]["role"], "model");
        assert_eq!(converted[1]["parts"][0], json!({"text": "Searching."}));
        let call = &converted[1]["parts"][1]["functionCall"];
        assert_eq!(call["args"]["query"], "bento grid");
        assert!(call.get("id").is_none());
        assert_eq!(converted[2]["role"], "user");
        assert_eq!(
            converted[2]["parts"][0],
            json!({"functionResponse": {"name": "search_web", "response": {"result": "**Bento**"}}})
        );
    }

    #[test]
    fn test_convert_messages_echoes_vendor_ids() {
        let history = vec![
            Message::user("read both cards"),
            Message::assistant(vec![
                ContentBlock::tool_use("fc-1", "read_file", Map::new()),
                ContentBlock::tool_use("fc-2", "read_file", Map::new()),
            ]),
            Message::tool_results(vec![
                ToolResultBlock {
                    tool_use_id: "fc-1".to_string(),
                    tool_name: "read_file".to_string(),
                    content: "first".to_string(),
                },
                ToolResultBlock {
                    tool_use_id: "fc-2".to_string(),
                    tool_name: "read_file".to_string(),
                    content: "second".to_string(),
                },
            ]),
        ];

        let converted = GeminiClient::convert_messages(&history);
        assert_eq!(converted[1]["parts"][0]["functionCall"]["id"], "fc-1");
        assert_eq!(converted[1]["parts"][1]["functionCall"]["id"], "fc-2");
        assert_eq!(converted[2]["parts"][0]["functionResponse"]["id"], "fc-1");
        assert_eq!(converted[2]["parts"][1]["functionResponse"]["id"], "fc-2");
        assert_eq!(converted[2]["parts"][1]["functionResponse"]["response"]["result"], "second");
    }

    #[test]
    fn test_parse_function_calls_generate_ids() {
        let result = parse(json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"functionCall": {"name": "read_file", "args": {"file_path": "a.tsx"}}},
                {"functionCall": {"name": "read_file", "args": {"file_path": "b.tsx"}}},
                {"functionCall": {"id": "vendor-id", "name": "list_files",
                                  "args": {"directory": "."}}}
            ]}}]
        }))
        .unwrap();

        assert_eq!(result.stop_reason, StopReason::ToolUse);
        let calls = result.tool_uses();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].id.starts_with("gemini_read_file_"));
        assert_ne!(calls[0].id, calls[1].id);
        assert_eq!(calls[1].input["file_path"], "b.tsx");
        assert_eq!(calls[2].id, "vendor-id");
    }

    #[test]
    fn test_parse_text_and_missing_candidates() {
        let result = parse(json!({
            "candidates": [{
                "content": {"parts": [{"text": "Found "}, {"text": "it."}]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(result.stop_reason, StopReason::EndTurn);
        assert_eq!(result.joined_text(), "Found it.");

        let blocked = parse(json!({"candidates": [{"finishReason": "SAFETY"}]})).unwrap();
        assert!(blocked.content.is_empty());
        assert_eq!(blocked.stop_reason, StopReason::EndTurn);

        let empty = parse(json!({}));
        assert!(matches!(empty, Err(Error::Llm(msg)) if msg.contains("no candidates")));
    }

    #[tokio::test]
    async fn test_chat_sends_key_and_system_instruction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Hi"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let tools = crate::tools::ToolRunner::with_defaults().definitions();
        let result = client.chat(&[Message::user("hello")], "Be bold.", &tools).await.unwrap();
        assert_eq!(result.joined_text(), "Hi");

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].url.query().is_none());
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be bold.");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 4096);
        let declarations = body["tools"][0]["functionDeclarations"].as_array().unwrap();
        assert_eq!(declarations.len(), 5);
        assert_eq!(declarations[0]["parameters"]["type"], "OBJECT");
    }

    #[tokio::test]
    async fn test_chat_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let err = client_for(&server).chat(&[Message::user("hi")], "", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Llm(msg) if msg.contains("Google") && msg.contains("API key not valid")
        ));
    }

    #[tokio::test]
    async fn test_transport_error_does_not_reveal_key() {
        let config = ProviderConfig::new(ProviderKind::Gemini, "gemini-test", "SECRET-GOOGLE-KEY")
            .with_host("http://127.0.0.1:1");
        let client = GeminiClient::new(config).unwrap();

        let err = client.chat(&[Message::user("hi")], "", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Llm(_)));
        assert!(!err.to_string().contains("SECRET-GOOGLE-KEY"), "{err}");
    }

    #[test]
    fn test_model_name() {
        let config = ProviderConfig::new(ProviderKind::Gemini, "gemini-2.5-pro", "k");
        let client = GeminiClient::new(config).unwrap();
        assert_eq!(client.model_name(), "Google/gemini-2.5-pro");
    }
}
