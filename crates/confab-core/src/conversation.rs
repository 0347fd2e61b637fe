//! Conversation model and short-term memory store.
//!
//! This module contains the role-tagged turn type shared by the orchestrator
//! and the completion backends, and the in-process store that holds the
//! conversation for the lifetime of the process. Nothing here is persisted
//! and nothing here knows about any backend's wire format.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Represents the role of a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions synthesized fresh for every request; never stored.
    System,
    /// Input from the user.
    User,
    /// Output from the model.
    Assistant,
    /// Acknowledgement of a capability result, keyed by invocation id.
    Tool,
}

impl Role {
    /// The wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// One typed element of a structured content list.
///
/// Serializes to the `{type: text|image_url, ...}` part shape used by the
/// completion wire protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// A plain text fragment.
    Text { text: String },
    /// An image carried inline as a data URL (or a remote URL).
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    /// Creates a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Creates an image part from a URL or data URL.
    pub fn image_url(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

/// The URL wrapper object of an image content part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// The content of a turn: either plain text or a list of typed parts.
///
/// Exactly two variants on purpose. Plain text covers the whole stored
/// conversation; the structured form only exists for the request-scoped turn
/// that carries a screen capture to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    /// Plain text content.
    Text(String),
    /// A list of `{type: text|image_url}` parts.
    Parts(Vec<ContentPart>),
}

impl TurnContent {
    /// Returns the plain text of this content, flattening part lists by
    /// concatenating their text fragments.
    pub fn as_text(&self) -> String {
        match self {
            TurnContent::Text(text) => text.clone(),
            TurnContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A single turn in the conversation.
///
/// Ordering is the only relationship between turns; the store below is the
/// sole owner of that ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// The role of the turn's author.
    pub role: Role,
    /// The content of the turn.
    pub content: TurnContent,
    /// Timestamp when the turn was created (ISO 8601 format).
    pub timestamp: String,
}

impl Turn {
    /// Creates a turn with the given role and plain text content.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: TurnContent::Text(text.into()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Creates a user turn with plain text content.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Creates an assistant turn with plain text content.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// The plain text of this turn's content.
    pub fn text(&self) -> String {
        self.content.as_text()
    }
}

/// Short-term conversation memory: an ordered sequence of turns.
///
/// The store is owned by the orchestration process, lives exactly as long as
/// the process, and is mutated only by the chat orchestrator. Appending and
/// rolling back the most recent unanswered user turn are the only mutations;
/// there is no reordering and no editing in place.
///
/// Invariant: at any quiescent point (no request in flight) the tail of the
/// sequence strictly alternates user/assistant turns. A failed request must
/// leave the store exactly as it was before the request began.
#[derive(Debug, Default)]
pub struct ConversationStore {
    turns: Vec<Turn>,
}

impl ConversationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn at the tail.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Removes the tail turn if and only if it is a `user` turn.
    ///
    /// This is the single corrective mutation of the store: it undoes the
    /// user turn of a request that failed before an assistant turn was
    /// appended. Calling it when the tail is not a user turn is a no-op,
    /// which makes the rollback idempotent and safe after partial appends.
    ///
    /// Returns `true` if a turn was removed.
    pub fn rollback_last_user(&mut self) -> bool {
        match self.turns.last() {
            Some(turn) if turn.role == Role::User => {
                self.turns.pop();
                // Two consecutive user turns can only come from an earlier
                // invariant breach; repair one and leave a trace.
                if self
                    .turns
                    .last()
                    .is_some_and(|turn| turn.role == Role::User)
                {
                    tracing::warn!(
                        "conversation tail still ends with a user turn after rollback"
                    );
                }
                true
            }
            _ => false,
        }
    }

    /// Returns the full ordered sequence for assembling a backend request.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    /// Discards the whole conversation, starting fresh.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Number of stored turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the store holds no turns.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The tail turn, if any.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }
}
