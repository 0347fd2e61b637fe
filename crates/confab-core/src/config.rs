//! Runtime configuration for the orchestration core.
//!
//! Configuration is read once at startup. The secret file
//! `~/.config/confab/secret.json` takes priority, then environment
//! variables. A missing credential never aborts startup: the cloud backend
//! reports it per request instead.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default timeout applied to every remote call.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Which completion backend the orchestrator talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The cloud chat-completions service (requires a credential).
    #[default]
    OpenAi,
    /// A local generation server (no credential, no capability invocation).
    Local,
}

impl BackendKind {
    /// Parses a selector string.
    ///
    /// Accepts: "openai", "local", "ollama". Anything else falls back to the
    /// default cloud backend.
    pub fn from_selector(selector: &str) -> Self {
        match selector.trim().to_lowercase().as_str() {
            "local" | "ollama" => BackendKind::Local,
            "openai" => BackendKind::OpenAi,
            other => {
                tracing::warn!(selector = other, "unknown backend selector, using openai");
                BackendKind::OpenAi
            }
        }
    }
}

/// On-disk shape of `secret.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretFile {
    /// API key for the cloud completion and transcription services.
    pub api_key: Option<String>,
    /// Backend selector ("openai", "local").
    pub backend: Option<String>,
    /// Chat model override.
    pub chat_model: Option<String>,
    /// Transcription model override.
    pub transcription_model: Option<String>,
}

/// Resolved configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Selected completion backend.
    pub backend: BackendKind,
    /// Credential for the cloud services. `None` is valid: the cloud backend
    /// turns it into a per-request error, and the local backend ignores it.
    pub api_key: Option<String>,
    /// Chat model override; each backend supplies its own default.
    pub chat_model: Option<String>,
    /// Transcription model override.
    pub transcription_model: Option<String>,
    /// Timeout for every remote call.
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            api_key: None,
            chat_model: None,
            transcription_model: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Settings {
    /// Loads configuration from `secret.json` and the environment.
    ///
    /// Priority per field:
    /// 1. `~/.config/confab/secret.json`
    /// 2. Environment variables (`OPENAI_API_KEY`, `CONFAB_BACKEND`,
    ///    `CONFAB_CHAT_MODEL`, `CONFAB_TRANSCRIPTION_MODEL`)
    ///
    /// Never fails: unreadable or malformed sources degrade to defaults.
    pub fn load() -> Self {
        let secret = Self::read_secret_file().unwrap_or_default();
        Self::resolve(secret, |name| env::var(name).ok())
    }

    /// Path of the secret file, if a config directory exists.
    pub fn secret_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("confab").join("secret.json"))
    }

    fn read_secret_file() -> Option<SecretFile> {
        let path = Self::secret_path()?;
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(secret) => Some(secret),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "ignoring malformed secret file");
                None
            }
        }
    }

    /// Merges the secret file with an environment lookup.
    ///
    /// Split out from [`Settings::load`] so the merge order is testable
    /// without touching the process environment.
    fn resolve(secret: SecretFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let api_key = non_empty(secret.api_key).or_else(|| non_empty(env("OPENAI_API_KEY")));
        let backend = non_empty(secret.backend)
            .or_else(|| non_empty(env("CONFAB_BACKEND")))
            .map(|selector| BackendKind::from_selector(&selector))
            .unwrap_or_default();
        let chat_model =
            non_empty(secret.chat_model).or_else(|| non_empty(env("CONFAB_CHAT_MODEL")));
        let transcription_model = non_empty(secret.transcription_model)
            .or_else(|| non_empty(env("CONFAB_TRANSCRIPTION_MODEL")));

        Self {
            backend,
            api_key,
            chat_model,
            transcription_model,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Treats empty and whitespace-only values as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_when_everything_is_absent() {
        let settings = Settings::resolve(SecretFile::default(), no_env);
        assert_eq!(settings.backend, BackendKind::OpenAi);
        assert!(settings.api_key.is_none());
        assert!(settings.chat_model.is_none());
        assert_eq!(settings.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_secret_file_takes_priority_over_env() {
        let secret = SecretFile {
            api_key: Some("sk-from-file".to_string()),
            ..SecretFile::default()
        };
        let settings = Settings::resolve(secret, |name| match name {
            "OPENAI_API_KEY" => Some("sk-from-env".to_string()),
            _ => None,
        });
        assert_eq!(settings.api_key.as_deref(), Some("sk-from-file"));
    }

    #[test]
    fn test_env_fills_missing_fields() {
        let settings = Settings::resolve(SecretFile::default(), |name| match name {
            "OPENAI_API_KEY" => Some("sk-env".to_string()),
            "CONFAB_BACKEND" => Some("local".to_string()),
            "CONFAB_CHAT_MODEL" => Some("llama3.2".to_string()),
            _ => None,
        });
        assert_eq!(settings.api_key.as_deref(), Some("sk-env"));
        assert_eq!(settings.backend, BackendKind::Local);
        assert_eq!(settings.chat_model.as_deref(), Some("llama3.2"));
    }

    #[test]
    fn test_empty_credential_counts_as_absent() {
        let secret = SecretFile {
            api_key: Some("   ".to_string()),
            ..SecretFile::default()
        };
        let settings = Settings::resolve(secret, no_env);
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_backend_selector_parsing() {
        assert_eq!(BackendKind::from_selector("openai"), BackendKind::OpenAi);
        assert_eq!(BackendKind::from_selector("local"), BackendKind::Local);
        assert_eq!(BackendKind::from_selector("Ollama"), BackendKind::Local);
        assert_eq!(BackendKind::from_selector("mystery"), BackendKind::OpenAi);
    }

    #[test]
    fn test_secret_file_deserializes_partial_json() {
        let secret: SecretFile =
            serde_json::from_str(r#"{"api_key": "sk-test"}"#).unwrap();
        assert_eq!(secret.api_key.as_deref(), Some("sk-test"));
        assert!(secret.backend.is_none());
    }
}
