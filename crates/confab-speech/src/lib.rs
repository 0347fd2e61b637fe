//! Speech-to-text pipeline for the Confab orchestration core.
//!
//! Couples the best-effort audio normalizer (external `ffmpeg` process with
//! fallback to the original bytes) with the remote transcription client.

pub mod transcode;
pub mod transcribe;

pub use transcode::{TARGET_SAMPLE_RATE, Transcoder};
pub use transcribe::{DEFAULT_TRANSCRIPTION_MODEL, TranscriptionClient};

use confab_core::Result;

/// The full audio-to-text pipeline: normalize, then transcribe.
#[derive(Debug, Clone)]
pub struct SpeechPipeline {
    transcoder: Transcoder,
    client: TranscriptionClient,
}

impl SpeechPipeline {
    /// Builds a pipeline from its two stages.
    pub fn new(transcoder: Transcoder, client: TranscriptionClient) -> Self {
        Self { transcoder, client }
    }

    /// Converts recorded audio to text.
    ///
    /// The normalization stage never fails on its own; if the converter is
    /// unavailable the original bytes go to the transcription service
    /// unchanged. Errors out of this method are therefore configuration or
    /// remote-service failures only.
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        let normalized = self.transcoder.transcode(audio).await;
        self.client.transcribe(normalized).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_pipeline_surfaces_config_error_after_fallback() {
        let temp = tempfile::tempdir().unwrap();
        let transcoder = Transcoder::new()
            .with_converter("/nonexistent/ffmpeg")
            .with_temp_dir(temp.path());
        let client = TranscriptionClient::new(None, None, Duration::from_secs(5));
        let pipeline = SpeechPipeline::new(transcoder, client);

        let err = pipeline.transcribe(b"audio").await.unwrap_err();
        assert!(err.is_config());
        // Conversion failure was recovered locally; no temp files remain.
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }
}
