//! Remote speech-to-text client.
//!
//! Uploads a (possibly normalized) audio blob to the transcription endpoint
//! as a multipart form and returns the recognized text.

use std::time::Duration;

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use confab_core::{ConfabError, Result};

/// Model used when no override is configured.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "gpt-4o-transcribe";

const TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Client for the remote transcription service.
#[derive(Debug, Clone)]
pub struct TranscriptionClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
    timeout: Duration,
}

impl TranscriptionClient {
    /// Creates a client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Credential for the service; `None` yields a per-call
    ///   configuration error, never a construction failure.
    /// * `model` - Transcription model override.
    /// * `timeout` - Bound on the whole upload + response cycle.
    pub fn new(api_key: Option<String>, model: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            endpoint: TRANSCRIPTION_URL.to_string(),
            timeout,
        }
    }

    /// Overrides the endpoint URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// The model this client submits.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Submits `audio` and returns the recognized text, or empty text when
    /// the service returns none.
    pub async fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ConfabError::config(
                    "Set OPENAI_API_KEY in your environment to transcribe audio.",
                )
            })?;

        let part = Part::bytes(audio)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|err| ConfabError::internal(format!("invalid upload part: {}", err)))?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", "en");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ConfabError::transport("The transcription request timed out.")
                } else {
                    ConfabError::transport(format!(
                        "Failed to reach the transcription service. {}",
                        err
                    ))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, body = %body, "transcription request rejected");
            return Err(ConfabError::transport(format!(
                "Transcription error: {}",
                status
            )));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|_| ConfabError::protocol("No response from the transcription service."))?;
        Ok(parsed.text.unwrap_or_default())
    }
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: Option<String>,
}
