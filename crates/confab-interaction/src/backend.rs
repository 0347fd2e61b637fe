//! Completion backend abstraction.
//!
//! One trait, two interchangeable implementations selected by configuration:
//! the cloud chat-completions service (credentialed, capability-aware) and a
//! local generation server (no credential, text only). The orchestrator only
//! ever talks to the trait.

use async_trait::async_trait;

use confab_core::Result;
use confab_core::conversation::{Role, Turn, TurnContent};

/// Name of the one capability the orchestrator knows how to execute.
pub const CAPTURE_SCREEN_TOOL: &str = "capture_screen";

/// A structured request from the model asking the orchestrator to perform an
/// action before final text can be produced.
///
/// Produced inside an assistant-role response, consumed within the same
/// request, never stored in the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityInvocation {
    /// Opaque token identifying the invocation within the exchange.
    pub id: String,
    /// Capability identifier.
    pub name: String,
    /// Opaque argument payload, passed through verbatim.
    pub arguments: String,
}

/// One message of a completion exchange.
///
/// Richer than a stored [`Turn`]: it can carry the invocation metadata that
/// exists only for the duration of one request.
#[derive(Debug, Clone)]
pub struct ExchangeMessage {
    pub role: Role,
    pub content: TurnContent,
    /// Invocations echoed back on the assistant message of a capability
    /// round trip.
    pub tool_calls: Option<Vec<CapabilityInvocation>>,
    /// Invocation id this message answers (role `tool` only).
    pub tool_call_id: Option<String>,
}

impl ExchangeMessage {
    /// A plain message with no invocation metadata.
    pub fn new(role: Role, content: TurnContent) -> Self {
        Self {
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Maps a stored turn into the exchange shape.
    pub fn from_turn(turn: &Turn) -> Self {
        Self::new(turn.role, turn.content.clone())
    }
}

/// A complete request against a completion backend: a freshly synthesized
/// system prompt plus the ordered conversation (and, on a capability round
/// trip, the request-scoped messages carrying the capability result).
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub messages: Vec<ExchangeMessage>,
    /// Whether the backend may offer capability invocations in its reply.
    pub allow_capabilities: bool,
}

/// Successful outcome of one backend call.
#[derive(Debug, Clone)]
pub enum CompletionReply {
    /// Final response text.
    Text(String),
    /// The model wants a capability executed before it can answer.
    Invocation {
        /// Text the model produced alongside the invocation, if any.
        content: Option<String>,
        invocation: CapabilityInvocation,
    },
}

/// A service that turns a conversation history into response text.
///
/// Implementations must translate every transport fault, non-success status,
/// and malformed body into a [`confab_core::ConfabError`] with a
/// human-readable message; no raw client error may propagate past this trait.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Human-readable backend name for messages and logs.
    fn name(&self) -> &str;

    /// Whether this backend understands capability declarations at all.
    fn supports_capabilities(&self) -> bool {
        false
    }

    /// Executes one completion exchange.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply>;
}
