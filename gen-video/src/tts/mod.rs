//! TTS backend trait, engine adapters, and the per-chunk synthesizer.

pub mod command;
pub mod http;
pub mod mock;
pub mod synthesizer;

pub use command::CommandBackend;
pub use http::HttpBackend;
pub use mock::MockBackend;
pub use synthesizer::Synthesizer;

use crate::config::{TtsBackendKind, TtsConfig};
use anyhow::Result;
use async_trait::async_trait;
use log::warn;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// TTS backend trait - all speech engines implement this.
#[async_trait]
pub trait TtsBackend: Send + Sync {
    /// Synthesize text to an audio file at `output_path`.
    async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()>;

    /// File extension of the audio this backend writes (e.g. "wav", "mp3").
    fn extension(&self) -> &str;

    /// Backend name for display.
    fn name(&self) -> &str;

    /// Synthesize, retrying up to `max_retries` extra times on failure.
    async fn synthesize_with_retry(
        &self,
        text: &str,
        output_path: &Path,
        max_retries: u32,
    ) -> Result<()> {
        let attempts = max_retries.saturating_add(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            match self.synthesize(text, output_path).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if attempt + 1 < attempts {
                        warn!(
                            "{}: generation failed (attempt {}/{}): {:#}",
                            self.name(),
                            attempt + 1,
                            attempts,
                            e
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("All retry attempts failed")))
    }
}

/// Create the TTS backend described by the configuration.
pub fn create_backend(config: &TtsConfig) -> Result<Arc<dyn TtsBackend>> {
    let backend: Arc<dyn TtsBackend> = match config.backend {
        TtsBackendKind::Command => Arc::new(CommandBackend::new(
            &config.command,
            config.args.clone(),
            &config.format,
        )),
        TtsBackendKind::Http => Arc::new(HttpBackend::new(
            &config.url,
            &config.lang,
            Duration::from_secs(config.timeout_secs),
            &config.format,
        )?),
    };
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_command_backend() {
        let config = TtsConfig::default();
        let backend = create_backend(&config).unwrap();
        assert_eq!(backend.name(), "espeak-ng");
        assert_eq!(backend.extension(), "wav");
    }

    #[test]
    fn test_create_http_backend() {
        let config = TtsConfig {
            backend: TtsBackendKind::Http,
            format: "mp3".to_string(),
            ..TtsConfig::default()
        };
        let backend = create_backend(&config).unwrap();
        assert_eq!(backend.name(), "http");
        assert_eq!(backend.extension(), "mp3");
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let dir = TempDir::new().unwrap();
        let backend = MockBackend::fails_then_succeeds(2, 1.0);
        backend
            .synthesize_with_retry("hello", &dir.path().join("a.wav"), 2)
            .await
            .unwrap();
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_no_retry_fails_fast() {
        let dir = TempDir::new().unwrap();
        let backend = MockBackend::fails_then_succeeds(1, 1.0);
        let result = backend
            .synthesize_with_retry("hello", &dir.path().join("a.wav"), 0)
            .await;
        assert!(result.is_err());
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_returns_last_error() {
        let dir = TempDir::new().unwrap();
        let backend = MockBackend::always_fails("engine offline");
        let err = backend
            .synthesize_with_retry("hello", &dir.path().join("a.wav"), 3)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("engine offline"));
        assert_eq!(backend.call_count(), 4);
    }
}
