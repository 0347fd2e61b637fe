//! Assistant service: the two inbound operations of the core.
//!
//! Wires the chat orchestrator and the speech pipeline behind `ask` and
//! `transcribe`, converting every error into a marked plain-text string so
//! the caller renders responses and failures through the same channel.

use std::sync::Arc;

use confab_capture::ScreenCapture;
use confab_core::config::{BackendKind, Settings};
use confab_core::conversation::Turn;
use confab_interaction::{ChatOrchestrator, CompletionBackend, OllamaBackend, OpenAiBackend};
use confab_speech::{SpeechPipeline, TranscriptionClient, Transcoder};

/// Marker glyph prefixed to every error string.
pub const ERROR_MARKER: &str = "❌";

/// The orchestration core behind the assistant window.
pub struct AssistantService {
    orchestrator: ChatOrchestrator,
    speech: SpeechPipeline,
}

impl AssistantService {
    /// Wires a service from explicit parts.
    pub fn new(orchestrator: ChatOrchestrator, speech: SpeechPipeline) -> Self {
        Self {
            orchestrator,
            speech,
        }
    }

    /// Wires a service from startup configuration.
    ///
    /// The configured backend kind selects the completion strategy; nothing
    /// here fails on a missing credential, which is reported per request
    /// instead.
    pub fn from_settings(settings: &Settings, capture: Arc<dyn ScreenCapture>) -> Self {
        let backend: Arc<dyn CompletionBackend> = match settings.backend {
            BackendKind::OpenAi => Arc::new(OpenAiBackend::new(
                settings.api_key.clone(),
                settings.chat_model.clone(),
                settings.request_timeout,
            )),
            BackendKind::Local => Arc::new(OllamaBackend::new(
                settings.chat_model.clone(),
                settings.request_timeout,
            )),
        };
        tracing::debug!(backend = backend.name(), "assistant service configured");

        let orchestrator = ChatOrchestrator::new(backend, capture);
        let speech = SpeechPipeline::new(
            Transcoder::new(),
            TranscriptionClient::new(
                settings.api_key.clone(),
                settings.transcription_model.clone(),
                settings.request_timeout,
            ),
        );
        Self::new(orchestrator, speech)
    }

    /// Handles one user prompt and returns the response text.
    ///
    /// The response is always a string: failures come back prefixed with
    /// [`ERROR_MARKER`] so the caller needs no separate error channel.
    pub async fn ask(&self, prompt: &str) -> String {
        match self.orchestrator.ask(prompt).await {
            Ok(text) => text,
            Err(err) => format!("{ERROR_MARKER} {err}"),
        }
    }

    /// Converts recorded audio into a text prompt.
    pub async fn transcribe(&self, audio: &[u8]) -> String {
        match self.speech.transcribe(audio).await {
            Ok(text) => text,
            Err(err) => format!("{ERROR_MARKER} {err}"),
        }
    }

    /// Name of the configured completion backend.
    pub fn backend_name(&self) -> &str {
        self.orchestrator.backend_name()
    }

    /// The stored conversation, for rendering.
    pub async fn history(&self) -> Vec<Turn> {
        self.orchestrator.history().await
    }

    /// Starts a fresh conversation.
    pub async fn reset(&self) {
        self.orchestrator.reset().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use confab_capture::MockScreenCapture;
    use confab_core::{ConfabError, Result};
    use confab_interaction::{CompletionReply, CompletionRequest};

    struct ScriptedBackend {
        reply: Result<CompletionReply>,
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionReply> {
            self.reply.clone()
        }
    }

    fn service_with_reply(reply: Result<CompletionReply>) -> AssistantService {
        let orchestrator = ChatOrchestrator::new(
            Arc::new(ScriptedBackend { reply }),
            Arc::new(MockScreenCapture::unavailable()),
        );
        let speech = SpeechPipeline::new(
            Transcoder::new().with_converter("/nonexistent/ffmpeg"),
            TranscriptionClient::new(None, None, Duration::from_secs(5)),
        );
        AssistantService::new(orchestrator, speech)
    }

    #[tokio::test]
    async fn test_ask_returns_plain_text_on_success() {
        let service = service_with_reply(Ok(CompletionReply::Text("42".to_string())));
        let answer = service.ask("meaning of life?").await;
        assert_eq!(answer, "42");
        assert_eq!(service.history().await.len(), 2);
    }

    #[tokio::test]
    async fn test_ask_marks_errors_and_keeps_store_clean() {
        let service = service_with_reply(Err(ConfabError::transport(
            "Failed to reach OpenAI.",
        )));
        let answer = service.ask("hello").await;
        assert_eq!(answer, "❌ Failed to reach OpenAI.");
        assert!(service.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_transcribe_marks_configuration_errors() {
        let service = service_with_reply(Ok(CompletionReply::Text(String::new())));
        let text = service.transcribe(b"audio").await;
        assert!(text.starts_with("❌ "));
        assert!(text.contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn test_from_settings_selects_cloud_backend() {
        let settings = Settings::default();
        let service = AssistantService::from_settings(
            &settings,
            Arc::new(MockScreenCapture::unavailable()),
        );
        assert_eq!(service.backend_name(), "OpenAI");
    }

    #[tokio::test]
    async fn test_from_settings_selects_local_backend() {
        let settings = Settings {
            backend: BackendKind::Local,
            ..Settings::default()
        };
        let service = AssistantService::from_settings(
            &settings,
            Arc::new(MockScreenCapture::unavailable()),
        );
        assert_eq!(service.backend_name(), "local model server");
    }

    #[tokio::test]
    async fn test_missing_credential_surfaces_as_marked_string() {
        let settings = Settings::default(); // cloud backend, no key
        let service = AssistantService::from_settings(
            &settings,
            Arc::new(MockScreenCapture::unavailable()),
        );
        let answer = service.ask("hello").await;
        assert!(answer.starts_with("❌ "));
        assert!(answer.contains("OPENAI_API_KEY"));
        assert!(service.history().await.is_empty());
    }
}
