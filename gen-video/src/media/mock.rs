//! Mock media encoder for testing
//!
//! Works on plain-text stand-ins for media files so the whole pipeline can run
//! offline. A mock media file holds its duration in seconds on the first line,
//! followed by one label line per piece of content it was built from.

use super::{MediaEncoder, StillVideoJob, parse_manifest};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Write a mock media file.
pub fn write_mock_media(path: &Path, duration_seconds: f64, labels: &[&str]) -> Result<()> {
    let mut content = format!("{}\n", duration_seconds);
    for label in labels {
        content.push_str(label);
        content.push('\n');
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Read a mock media file back as (duration, labels).
pub fn read_mock_media(path: &Path) -> Result<(f64, Vec<String>)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut lines = content.lines();
    let duration: f64 = lines
        .next()
        .unwrap_or_default()
        .trim()
        .parse()
        .with_context(|| format!("{} is not a mock media file", path.display()))?;
    Ok((duration, lines.map(|l| l.to_string()).collect()))
}

/// A mock encoder with switchable failures
pub struct MockEncoder {
    /// Error message returned by concat (None = succeed)
    concat_error: Option<String>,
    /// Error message returned by encode_still (None = succeed)
    encode_error: Option<String>,
    /// Seconds added to every concatenated output, to simulate frame padding
    concat_padding: f64,
    concat_calls: AtomicUsize,
    encode_calls: AtomicUsize,
    /// Jobs passed to encode_still
    jobs: Mutex<Vec<StillVideoJob>>,
}

impl Default for MockEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEncoder {
    /// Create an encoder that always succeeds
    pub fn new() -> Self {
        Self {
            concat_error: None,
            encode_error: None,
            concat_padding: 0.0,
            concat_calls: AtomicUsize::new(0),
            encode_calls: AtomicUsize::new(0),
            jobs: Mutex::new(Vec::new()),
        }
    }

    /// Make every concat fail with the given message
    pub fn failing_concat(mut self, message: &str) -> Self {
        self.concat_error = Some(message.to_string());
        self
    }

    /// Make every encode fail with the given message
    pub fn failing_encode(mut self, message: &str) -> Self {
        self.encode_error = Some(message.to_string());
        self
    }

    /// Add a fixed amount of extra duration to every concat output
    pub fn with_concat_padding(mut self, seconds: f64) -> Self {
        self.concat_padding = seconds;
        self
    }

    pub fn concat_calls(&self) -> usize {
        self.concat_calls.load(Ordering::SeqCst)
    }

    pub fn encode_calls(&self) -> usize {
        self.encode_calls.load(Ordering::SeqCst)
    }

    /// Jobs seen by encode_still so far
    pub fn jobs(&self) -> Vec<StillVideoJob> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl MediaEncoder for MockEncoder {
    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        read_mock_media(path).map(|(duration, _)| duration)
    }

    async fn concat(&self, manifest: &Path, output: &Path) -> Result<()> {
        self.concat_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.concat_error {
            anyhow::bail!("{}", message);
        }

        let content = std::fs::read_to_string(manifest)
            .with_context(|| format!("Failed to read manifest {}", manifest.display()))?;

        let mut total = self.concat_padding;
        let mut labels = Vec::new();
        for input in parse_manifest(&content) {
            let (duration, input_labels) = read_mock_media(&input)?;
            total += duration;
            labels.extend(input_labels);
        }

        let labels: Vec<&str> = labels.iter().map(|l| l.as_str()).collect();
        write_mock_media(output, total, &labels)
    }

    async fn encode_still(&self, job: &StillVideoJob) -> Result<()> {
        self.encode_calls.fetch_add(1, Ordering::SeqCst);
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(job.clone());

        if let Some(message) = &self.encode_error {
            anyhow::bail!("{}", message);
        }

        if !job.image.exists() {
            anyhow::bail!("image {} does not exist", job.image.display());
        }
        let (_, labels) = read_mock_media(&job.audio)?;
        let labels: Vec<&str> = labels.iter().map(|l| l.as_str()).collect();
        write_mock_media(&job.output, job.duration_seconds, &labels)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
