//! Audio normalization via an external converter process.
//!
//! Recorded audio arrives as a compressed blob (WebM/Opus from the recorder).
//! The transcription service is happier with mono 16 kHz uncompressed WAV, so
//! the pipeline shells out to `ffmpeg` to convert. When the converter is
//! missing, crashes, or hangs, the original bytes are used instead; the
//! conversion is best-effort and never fails a transcription on its own.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::process::Command;
use uuid::Uuid;

use confab_core::{ConfabError, Result};

/// Sample rate of the normalized output.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Upper bound on how long the converter may run for one blob.
const DEFAULT_CONVERTER_WAIT: Duration = Duration::from_secs(30);

/// The pair of temporary files backing one conversion.
///
/// Both files are owned guards: dropping the job deletes them, so every exit
/// path out of a conversion (success, converter failure, read-back failure,
/// panic) leaves no residue on disk. No other component ever sees these
/// paths.
struct TranscodeJob {
    source: NamedTempFile,
    target: NamedTempFile,
}

impl TranscodeJob {
    fn create(dir: &Path) -> Result<Self> {
        let id = Uuid::new_v4();
        let source = tempfile::Builder::new()
            .prefix(&format!("confab-{id}-"))
            .suffix(".webm")
            .tempfile_in(dir)?;
        let target = tempfile::Builder::new()
            .prefix(&format!("confab-{id}-"))
            .suffix(".wav")
            .tempfile_in(dir)?;
        Ok(Self { source, target })
    }

    fn source_path(&self) -> &Path {
        self.source.path()
    }

    fn target_path(&self) -> &Path {
        self.target.path()
    }
}

/// Converts captured audio into mono 16 kHz s16le WAV, falling back to the
/// original bytes when the converter cannot do the job.
#[derive(Debug, Clone)]
pub struct Transcoder {
    converter: PathBuf,
    temp_dir: PathBuf,
    wait: Duration,
}

impl Transcoder {
    /// A transcoder using `ffmpeg` from `PATH` and the system temp dir.
    pub fn new() -> Self {
        Self {
            converter: PathBuf::from("ffmpeg"),
            temp_dir: std::env::temp_dir(),
            wait: DEFAULT_CONVERTER_WAIT,
        }
    }

    /// Overrides the converter executable.
    pub fn with_converter(mut self, converter: impl Into<PathBuf>) -> Self {
        self.converter = converter.into();
        self
    }

    /// Overrides the directory holding the temporary files.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Overrides the bounded wait on the converter process.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Normalizes `source` to mono 16 kHz WAV.
    ///
    /// On any converter failure (missing executable, non-zero exit, timeout,
    /// unreadable output) the original bytes are returned unchanged; the
    /// failure is logged and otherwise swallowed here. It only becomes
    /// visible to the user if the transcription service also rejects the
    /// unconverted audio.
    pub async fn transcode(&self, source: &[u8]) -> Vec<u8> {
        match self.convert(source).await {
            Ok(normalized) => normalized,
            Err(err) => {
                tracing::warn!(error = %err, "audio conversion failed, using original bytes");
                source.to_vec()
            }
        }
    }

    async fn convert(&self, source: &[u8]) -> Result<Vec<u8>> {
        let job = TranscodeJob::create(&self.temp_dir)?;
        tokio::fs::write(job.source_path(), source).await?;

        let status = tokio::time::timeout(
            self.wait,
            Command::new(&self.converter)
                .arg("-y")
                .arg("-i")
                .arg(job.source_path())
                .args(["-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1"])
                .arg(job.target_path())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .status(),
        )
        .await
        .map_err(|_| {
            ConfabError::media(format!(
                "converter did not finish within {}s",
                self.wait.as_secs()
            ))
        })?
        .map_err(|err| ConfabError::media(format!("failed to run converter: {}", err)))?;

        if !status.success() {
            return Err(ConfabError::media(format!(
                "converter exited with {}",
                status
            )));
        }

        let normalized = tokio::fs::read(job.target_path()).await?;
        if normalized.is_empty() {
            return Err(ConfabError::media("converter produced no output"));
        }
        Ok(normalized)
    }
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new()
    }
}
