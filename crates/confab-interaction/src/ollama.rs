//! Local completion backend talking to an Ollama server.
//!
//! No credential, no capability invocation: the conversation is flattened to
//! plain text and a single non-streaming chat call is made against the local
//! server. An unreachable server is turned into a message telling the user
//! to start it.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use async_trait::async_trait;
use confab_core::{ConfabError, Result};

use crate::backend::{CompletionBackend, CompletionReply, CompletionRequest};

/// Model used when no override is configured.
pub const DEFAULT_LOCAL_MODEL: &str = "llama3.2";

const BASE_URL: &str = "http://localhost:11434";

/// Backend implementation for a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: Client,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl OllamaBackend {
    /// Creates a backend for the default local server address.
    pub fn new(model: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            model: model.unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string()),
            base_url: BASE_URL.to_string(),
            timeout,
        }
    }

    /// Overrides the server base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The model this backend requests.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    fn name(&self) -> &str {
        "local model server"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply> {
        let body = build_chat_body(&self.model, request);
        let url = format!("{}/api/chat", self.base_url);
        tracing::debug!(messages = body.messages.len(), "sending local completion request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ConfabError::transport("The local model request timed out.")
                } else if err.is_connect() {
                    ConfabError::transport(
                        "Cannot reach the local model server. Start Ollama (`ollama serve`) and try again.",
                    )
                } else {
                    ConfabError::transport(format!(
                        "Failed to reach the local model server. {}",
                        err
                    ))
                }
            })?;

        if !response.status().is_success() {
            return Err(ConfabError::transport(format!(
                "Local model server error: {}",
                response.status()
            )));
        }

        let parsed: ChatReply = response
            .json()
            .await
            .map_err(|_| ConfabError::protocol("Could not parse the local model response."))?;
        extract_reply(parsed)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<LocalMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct LocalMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatReply {
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// The local server only understands plain text, so structured content is
/// flattened to its text fragments.
fn build_chat_body<'a>(model: &'a str, request: &CompletionRequest) -> ChatBody<'a> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    messages.push(LocalMessage {
        role: "system",
        content: request.system_prompt.clone(),
    });
    messages.extend(request.messages.iter().map(|message| LocalMessage {
        role: message.role.as_str(),
        content: message.content.as_text(),
    }));

    ChatBody {
        model,
        messages,
        stream: false,
    }
}

fn extract_reply(reply: ChatReply) -> Result<CompletionReply> {
    let content = reply
        .message
        .and_then(|message| message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| ConfabError::protocol("No response from the local model."))?;
    Ok(CompletionReply::Text(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ExchangeMessage;
    use confab_core::conversation::{ContentPart, Role, TurnContent};

    fn simple_request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "Be brief.".to_string(),
            messages: vec![ExchangeMessage::new(
                Role::User,
                TurnContent::Text("hello".to_string()),
            )],
            allow_capabilities: false,
        }
    }

    #[test]
    fn test_never_supports_capabilities() {
        let backend = OllamaBackend::new(None, Duration::from_secs(5));
        assert!(!backend.supports_capabilities());
        assert_eq!(backend.model(), DEFAULT_LOCAL_MODEL);
    }

    #[test]
    fn test_chat_body_is_non_streaming_with_system_first() {
        let body = build_chat_body("llama3.2", &simple_request());
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["model"], "llama3.2");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "Be brief.");
        assert_eq!(json["messages"][1]["content"], "hello");
    }

    #[test]
    fn test_structured_content_is_flattened_to_text() {
        let request = CompletionRequest {
            system_prompt: "sys".to_string(),
            messages: vec![ExchangeMessage::new(
                Role::User,
                TurnContent::Parts(vec![
                    ContentPart::text("part one"),
                    ContentPart::image_url("data:image/png;base64,AAAA"),
                ]),
            )],
            allow_capabilities: false,
        };
        let body = build_chat_body("m", &request);
        assert_eq!(body.messages[1].content, "part one");
    }

    #[test]
    fn test_extract_reply_text() {
        let reply: ChatReply =
            serde_json::from_str(r#"{"message": {"content": " hi there "}}"#).unwrap();
        match extract_reply(reply).unwrap() {
            CompletionReply::Text(text) => assert_eq!(text, "hi there"),
            other => panic!("expected text reply, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_reply_missing_message_is_protocol_error() {
        let reply: ChatReply = serde_json::from_str("{}").unwrap();
        let err = extract_reply(reply).unwrap_err();
        assert!(err.is_protocol());
    }

    #[tokio::test]
    async fn test_unreachable_server_tells_user_to_start_it() {
        // Nothing listens on the discard port; the connection is refused.
        let backend = OllamaBackend::new(None, Duration::from_secs(2))
            .with_base_url("http://127.0.0.1:9");
        let err = backend.complete(&simple_request()).await.unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("Start Ollama"));
    }
}
