//! Chat orchestrator: drives one completion exchange at a time against the
//! configured backend and owns the conversation store.
//!
//! An exchange appends the user turn, sends the conversation (behind a fresh
//! system prompt) to the backend, optionally satisfies a single screen
//! capture invocation, and commits the final assistant text. Every failure
//! after the user turn is appended rolls that turn back, so the store is
//! untouched by failed requests.

use std::sync::Arc;

use tokio::sync::Mutex;

use confab_capture::ScreenCapture;
use confab_core::conversation::{ContentPart, ConversationStore, Role, Turn, TurnContent};
use confab_core::{ConfabError, Result};

use crate::backend::{
    CAPTURE_SCREEN_TOOL, CapabilityInvocation, CompletionBackend, CompletionReply,
    CompletionRequest, ExchangeMessage,
};

/// Instructions synthesized fresh for every request; never stored.
const SYSTEM_PROMPT: &str =
    "You are my personal desktop AI assistant. Be concise, practical, and helpful.";

/// Opaque acknowledgement carried by the `tool` turn of a capture round trip.
const CAPTURE_ACK: &str = "Screenshot captured.";

/// Text part accompanying the image on the re-issued request.
const CAPTURE_PREAMBLE: &str = "Here is a screenshot of my current screen.";

/// One in-flight exchange: the user turn just appended plus a settled flag.
///
/// Created when the user turn enters the store, destroyed when the request
/// ends. Unless the exchange was settled with an assistant turn, dropping
/// the value rolls the user turn back, so every early return and error path
/// out of [`ChatOrchestrator::ask`] restores the store automatically.
struct PendingRequest<'a> {
    store: &'a mut ConversationStore,
    settled: bool,
}

impl<'a> PendingRequest<'a> {
    fn begin(store: &'a mut ConversationStore, prompt: &str) -> Self {
        store.append(Turn::user(prompt));
        Self {
            store,
            settled: false,
        }
    }

    fn snapshot(&self) -> Vec<Turn> {
        self.store.snapshot()
    }

    fn settle(mut self, reply: &str) {
        self.store.append(Turn::assistant(reply));
        self.settled = true;
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.store.rollback_last_user();
        }
    }
}

/// Central coordinator for the conversational exchange.
///
/// Owns the single conversation store and serializes exchanges behind one
/// lock: a second `ask` arriving while one is in flight waits for the first
/// to finish, so concurrent calls can never interleave their appends.
pub struct ChatOrchestrator {
    backend: Arc<dyn CompletionBackend>,
    capture: Arc<dyn ScreenCapture>,
    store: Mutex<ConversationStore>,
}

impl ChatOrchestrator {
    /// Creates an orchestrator over the given backend and capture provider.
    pub fn new(backend: Arc<dyn CompletionBackend>, capture: Arc<dyn ScreenCapture>) -> Self {
        Self {
            backend,
            capture,
            store: Mutex::new(ConversationStore::new()),
        }
    }

    /// Runs one full exchange for `prompt` and returns the assistant text.
    ///
    /// On success the store gains exactly the user turn and the final
    /// assistant turn; the intermediate messages of a capture round trip are
    /// request-scoped and never persisted. On any error the store is exactly
    /// as it was before the call.
    pub async fn ask(&self, prompt: &str) -> Result<String> {
        let mut store = self.store.lock().await;
        let pending = PendingRequest::begin(&mut store, prompt);
        let turns = pending.snapshot();

        match self.run_exchange(&turns).await {
            Ok(text) => {
                pending.settle(&text);
                Ok(text)
            }
            Err(err) => {
                tracing::error!(backend = self.backend.name(), error = %err, "exchange failed");
                Err(err)
            }
        }
    }

    /// Name of the backend this orchestrator talks to.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// The stored conversation, in order.
    pub async fn history(&self) -> Vec<Turn> {
        self.store.lock().await.snapshot()
    }

    /// Discards the stored conversation.
    pub async fn reset(&self) {
        self.store.lock().await.clear();
    }

    async fn run_exchange(&self, turns: &[Turn]) -> Result<String> {
        let request = CompletionRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            messages: turns.iter().map(ExchangeMessage::from_turn).collect(),
            allow_capabilities: self.backend.supports_capabilities(),
        };

        match self.backend.complete(&request).await? {
            CompletionReply::Text(text) => Ok(text),
            CompletionReply::Invocation {
                content,
                invocation,
            } => self.resolve_invocation(request, content, invocation).await,
        }
    }

    /// Satisfies a single capture invocation and re-issues the request.
    ///
    /// The three extra messages (assistant echo, tool acknowledgement, user
    /// turn with the image) extend the request only; they never touch the
    /// store. The re-issued request declares no capabilities, which bounds
    /// every `ask` to at most one capture and one re-issue.
    async fn resolve_invocation(
        &self,
        mut request: CompletionRequest,
        content: Option<String>,
        invocation: CapabilityInvocation,
    ) -> Result<String> {
        if invocation.name != CAPTURE_SCREEN_TOOL {
            return Err(ConfabError::protocol(format!(
                "The assistant requested an unknown capability: {}",
                invocation.name
            )));
        }

        tracing::debug!(id = %invocation.id, "resolving screen capture invocation");
        let image = self
            .capture
            .capture()
            .await
            .ok_or_else(|| ConfabError::transport("Screen capture is unavailable."))?;

        request.messages.push(ExchangeMessage {
            role: Role::Assistant,
            content: TurnContent::Text(content.unwrap_or_default()),
            tool_calls: Some(vec![invocation.clone()]),
            tool_call_id: None,
        });
        request.messages.push(ExchangeMessage {
            role: Role::Tool,
            content: TurnContent::Text(CAPTURE_ACK.to_string()),
            tool_calls: None,
            tool_call_id: Some(invocation.id.clone()),
        });
        request.messages.push(ExchangeMessage::new(
            Role::User,
            TurnContent::Parts(vec![
                ContentPart::text(CAPTURE_PREAMBLE),
                ContentPart::image_url(image.to_data_url()),
            ]),
        ));
        request.allow_capabilities = false;

        match self.backend.complete(&request).await? {
            CompletionReply::Text(text) => Ok(text),
            CompletionReply::Invocation { .. } => Err(ConfabError::protocol(
                "The assistant requested another capability after the screen capture.",
            )),
        }
    }
}
