//! HTTP TTS client - POSTs text to an external speech service.
//!
//! Request: `{"text": "...", "lang": "en"}` as JSON.
//! Response: the audio file as the raw body.

use super::TtsBackend;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    lang: &'a str,
}

pub struct HttpBackend {
    client: Client,
    url: String,
    lang: String,
    extension: String,
}

impl HttpBackend {
    pub fn new(
        url: impl Into<String>,
        lang: impl Into<String>,
        timeout: Duration,
        extension: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
            lang: lang.into(),
            extension: extension.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TtsBackend for HttpBackend {
    async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()> {
        let request = SpeechRequest {
            text,
            lang: &self.lang,
        };

        debug!("POST {} ({} chars)", self.url, text.chars().count());

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow::anyhow!("TTS request to {} timed out", self.url)
                } else if e.is_connect() {
                    anyhow::anyhow!("Cannot connect to TTS service at {}: {}", self.url, e)
                } else {
                    anyhow::anyhow!("TTS request to {} failed: {}", self.url, e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("TTS service returned HTTP {}: {}", status, error_text.trim());
        }

        let audio = response
            .bytes()
            .await
            .context("Failed to read audio from TTS response")?;

        if audio.is_empty() {
            anyhow::bail!("TTS service returned an empty body");
        }

        tokio::fs::write(output_path, &audio)
            .await
            .with_context(|| format!("Failed to write {}", output_path.display()))?;

        Ok(())
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(SpeechRequest {
            text: "Hello there",
            lang: "en",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"text": "Hello there", "lang": "en"}));
    }

    #[test]
    fn test_backend_builder() {
        let backend = HttpBackend::new(
            "http://example.com:9000/tts",
            "en",
            Duration::from_secs(60),
            "mp3",
        )
        .unwrap();
        assert_eq!(backend.url(), "http://example.com:9000/tts");
        assert_eq!(backend.extension(), "mp3");
    }

    #[tokio::test]
    async fn test_unreachable_service_fails() {
        let dir = TempDir::new().unwrap();
        // Port 9 (discard) is essentially never serving HTTP
        let backend =
            HttpBackend::new("http://127.0.0.1:9/tts", "en", Duration::from_secs(2), "mp3").unwrap();
        let out = dir.path().join("a.mp3");
        let result = backend.synthesize("hello", &out).await;
        assert!(result.is_err());
        assert!(!out.exists());
    }
}
