//! Completion backends and the chat orchestrator for the Confab
//! orchestration core.
//!
//! The [`backend::CompletionBackend`] trait abstracts over the cloud
//! chat-completions service ([`openai::OpenAiBackend`]) and a local
//! generation server ([`ollama::OllamaBackend`]); the
//! [`orchestrator::ChatOrchestrator`] drives one exchange at a time against
//! whichever implementation configuration selected.

pub mod backend;
pub mod ollama;
pub mod openai;
pub mod orchestrator;

pub use backend::{
    CAPTURE_SCREEN_TOOL, CapabilityInvocation, CompletionBackend, CompletionReply,
    CompletionRequest, ExchangeMessage,
};
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;
pub use orchestrator::ChatOrchestrator;
