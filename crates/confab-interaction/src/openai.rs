//! Cloud completion backend talking to the OpenAI Chat Completions API.
//!
//! Requires a credential; its absence is reported per request without any
//! network call. Supports the screen-capture capability declaration.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use async_trait::async_trait;
use confab_core::conversation::TurnContent;
use confab_core::{ConfabError, Result};

use crate::backend::{
    CAPTURE_SCREEN_TOOL, CapabilityInvocation, CompletionBackend, CompletionReply,
    CompletionRequest, ExchangeMessage,
};

/// Model used when no override is configured.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

const BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Backend implementation for the OpenAI HTTP API.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
    timeout: Duration,
}

impl OpenAiBackend {
    /// Creates a backend.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Credential; `None` yields a per-request configuration
    ///   error, never a construction failure.
    /// * `model` - Chat model override.
    /// * `timeout` - Bound on each completion call.
    pub fn new(api_key: Option<String>, model: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            endpoint: BASE_URL.to_string(),
            timeout,
        }
    }

    /// Overrides the endpoint URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// The model this backend requests.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "OpenAI"
    }

    fn supports_capabilities(&self) -> bool {
        true
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ConfabError::config("Set OPENAI_API_KEY in your environment to use OpenAI.")
            })?;

        let body = build_wire_request(&self.model, request);
        tracing::debug!(
            messages = body.messages.len(),
            tools = body.tools.is_some(),
            "sending completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ConfabError::transport("The OpenAI request timed out.")
                } else {
                    ConfabError::transport(format!("Failed to reach OpenAI. {}", err))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(map_http_error(status, body_text));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|_| ConfabError::protocol("Could not parse the OpenAI response."))?;
        extract_reply(parsed)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDecl>>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: TurnContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    fn from_exchange(message: &ExchangeMessage) -> Self {
        Self {
            role: message.role.as_str(),
            content: message.content.clone(),
            tool_calls: message
                .tool_calls
                .as_ref()
                .map(|calls| calls.iter().map(WireToolCall::from_invocation).collect()),
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

impl WireToolCall {
    fn from_invocation(invocation: &CapabilityInvocation) -> Self {
        Self {
            id: invocation.id.clone(),
            kind: "function".to_string(),
            function: WireFunction {
                name: invocation.name.clone(),
                arguments: invocation.arguments.clone(),
            },
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct ToolDecl {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionDecl,
}

#[derive(Serialize)]
struct FunctionDecl {
    name: &'static str,
    description: &'static str,
    parameters: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

// ============================================================================
// Request assembly and response extraction
// ============================================================================

fn build_wire_request<'a>(model: &'a str, request: &CompletionRequest) -> WireRequest<'a> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    messages.push(WireMessage {
        role: "system",
        content: TurnContent::Text(request.system_prompt.clone()),
        tool_calls: None,
        tool_call_id: None,
    });
    messages.extend(request.messages.iter().map(WireMessage::from_exchange));

    WireRequest {
        model,
        messages,
        tools: request.allow_capabilities.then(|| vec![capture_tool_decl()]),
    }
}

fn capture_tool_decl() -> ToolDecl {
    ToolDecl {
        kind: "function",
        function: FunctionDecl {
            name: CAPTURE_SCREEN_TOOL,
            description: "Capture the user's current screen as an image. \
                          Use when the user asks about what is on their screen.",
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
            }),
        },
    }
}

fn map_http_error(status: StatusCode, body: String) -> ConfabError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| format!("{} {}", status, body));
    ConfabError::transport(format!("OpenAI error: {}", message))
}

fn extract_reply(response: ChatCompletionResponse) -> Result<CompletionReply> {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| ConfabError::protocol("No response from OpenAI."))?;

    match message.tool_calls {
        Some(mut calls) if !calls.is_empty() => {
            if calls.len() > 1 {
                tracing::warn!(
                    count = calls.len(),
                    "response carried multiple tool calls, using the first"
                );
            }
            let call = calls.remove(0);
            Ok(CompletionReply::Invocation {
                content: message.content,
                invocation: CapabilityInvocation {
                    id: call.id,
                    name: call.function.name,
                    arguments: call.function.arguments,
                },
            })
        }
        _ => {
            let content = message
                .content
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .ok_or_else(|| ConfabError::protocol("No response from OpenAI."))?;
            Ok(CompletionReply::Text(content))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_core::conversation::{ContentPart, Role};

    fn simple_request(allow_capabilities: bool) -> CompletionRequest {
        CompletionRequest {
            system_prompt: "Be helpful.".to_string(),
            messages: vec![ExchangeMessage::new(
                Role::User,
                TurnContent::Text("hello".to_string()),
            )],
            allow_capabilities,
        }
    }

    // ---- Credential gating ----

    #[tokio::test]
    async fn test_missing_credential_fails_without_network() {
        let backend = OpenAiBackend::new(None, None, Duration::from_secs(5));
        let err = backend.complete(&simple_request(true)).await.unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn test_blank_credential_fails_without_network() {
        let backend = OpenAiBackend::new(Some("  ".to_string()), None, Duration::from_secs(5));
        let err = backend.complete(&simple_request(false)).await.unwrap_err();
        assert!(err.is_config());
    }

    // ---- Defaults ----

    #[test]
    fn test_default_model_applies() {
        let backend = OpenAiBackend::new(None, None, Duration::from_secs(5));
        assert_eq!(backend.model(), DEFAULT_OPENAI_MODEL);
        assert!(backend.supports_capabilities());
        assert_eq!(backend.name(), "OpenAI");
    }

    // ---- Request assembly ----

    #[test]
    fn test_wire_request_starts_with_fresh_system_message() {
        let body = build_wire_request("gpt-4o-mini", &simple_request(false));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "Be helpful.");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "hello");
    }

    #[test]
    fn test_tools_declared_only_when_capabilities_allowed() {
        let with_tools = serde_json::to_value(build_wire_request("m", &simple_request(true))).unwrap();
        assert_eq!(with_tools["tools"][0]["type"], "function");
        assert_eq!(with_tools["tools"][0]["function"]["name"], "capture_screen");

        let without_tools =
            serde_json::to_value(build_wire_request("m", &simple_request(false))).unwrap();
        assert!(without_tools.get("tools").is_none());
    }

    #[test]
    fn test_invocation_round_trip_messages_serialize() {
        let invocation = CapabilityInvocation {
            id: "call_1".to_string(),
            name: CAPTURE_SCREEN_TOOL.to_string(),
            arguments: "{}".to_string(),
        };
        let request = CompletionRequest {
            system_prompt: "sys".to_string(),
            messages: vec![
                ExchangeMessage::new(Role::User, TurnContent::Text("look".to_string())),
                ExchangeMessage {
                    role: Role::Assistant,
                    content: TurnContent::Text(String::new()),
                    tool_calls: Some(vec![invocation.clone()]),
                    tool_call_id: None,
                },
                ExchangeMessage {
                    role: Role::Tool,
                    content: TurnContent::Text("Screenshot captured.".to_string()),
                    tool_calls: None,
                    tool_call_id: Some("call_1".to_string()),
                },
                ExchangeMessage::new(
                    Role::User,
                    TurnContent::Parts(vec![
                        ContentPart::text("Here is my screen."),
                        ContentPart::image_url("data:image/png;base64,AAAA"),
                    ]),
                ),
            ],
            allow_capabilities: false,
        };

        let json = serde_json::to_value(build_wire_request("m", &request)).unwrap();
        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 5);

        let echo = &messages[2];
        assert_eq!(echo["role"], "assistant");
        assert_eq!(echo["tool_calls"][0]["id"], "call_1");
        assert_eq!(echo["tool_calls"][0]["type"], "function");
        assert_eq!(echo["tool_calls"][0]["function"]["name"], "capture_screen");

        let ack = &messages[3];
        assert_eq!(ack["role"], "tool");
        assert_eq!(ack["tool_call_id"], "call_1");

        let image_turn = &messages[4];
        assert_eq!(image_turn["role"], "user");
        assert_eq!(image_turn["content"][0]["type"], "text");
        assert_eq!(image_turn["content"][1]["type"], "image_url");
        assert_eq!(
            image_turn["content"][1]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
    }

    #[test]
    fn test_plain_messages_omit_tool_fields() {
        let json = serde_json::to_value(build_wire_request("m", &simple_request(false))).unwrap();
        let user = &json["messages"][1];
        assert!(user.get("tool_calls").is_none());
        assert!(user.get("tool_call_id").is_none());
    }

    // ---- Response extraction ----

    #[test]
    fn test_extract_text_reply() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "  4  "}}]}"#,
        )
        .unwrap();
        match extract_reply(response).unwrap() {
            CompletionReply::Text(text) => assert_eq!(text, "4"),
            other => panic!("expected text reply, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_invocation_reply() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {
                "content": null,
                "tool_calls": [{"id": "call_9", "type": "function",
                    "function": {"name": "capture_screen", "arguments": "{}"}}]
            }}]}"#,
        )
        .unwrap();
        match extract_reply(response).unwrap() {
            CompletionReply::Invocation { content, invocation } => {
                assert!(content.is_none());
                assert_eq!(invocation.id, "call_9");
                assert_eq!(invocation.name, "capture_screen");
            }
            other => panic!("expected invocation reply, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_first_of_multiple_invocations() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {
                "content": null,
                "tool_calls": [
                    {"id": "a", "type": "function", "function": {"name": "capture_screen", "arguments": "{}"}},
                    {"id": "b", "type": "function", "function": {"name": "capture_screen", "arguments": "{}"}}
                ]
            }}]}"#,
        )
        .unwrap();
        match extract_reply(response).unwrap() {
            CompletionReply::Invocation { invocation, .. } => assert_eq!(invocation.id, "a"),
            other => panic!("expected invocation reply, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_content_is_a_protocol_error() {
        let response: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "   "}}]}"#).unwrap();
        let err = extract_reply(response).unwrap_err();
        assert!(err.is_protocol());
        assert_eq!(err.to_string(), "No response from OpenAI.");
    }

    #[test]
    fn test_no_choices_is_a_protocol_error() {
        let response: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(extract_reply(response).unwrap_err().is_protocol());
    }

    // ---- HTTP error mapping ----

    #[test]
    fn test_http_error_uses_service_message() {
        let err = map_http_error(
            StatusCode::UNAUTHORIZED,
            r#"{"error": {"message": "Incorrect API key provided"}}"#.to_string(),
        );
        assert!(err.is_transport());
        assert_eq!(err.to_string(), "OpenAI error: Incorrect API key provided");
    }

    #[test]
    fn test_http_error_falls_back_to_status_and_body() {
        let err = map_http_error(StatusCode::BAD_GATEWAY, "upstream died".to_string());
        assert!(err.is_transport());
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("upstream died"));
    }
}
