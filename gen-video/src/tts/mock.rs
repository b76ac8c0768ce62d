//! Mock TTS backend for testing
//!
//! Writes mock media files (see [`crate::media::mock`]) with a fixed duration
//! and can simulate failures, retries, and uneven latency.

use super::TtsBackend;
use crate::media::mock::write_mock_media;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type LatencyFn = Box<dyn Fn(&str) -> Duration + Send + Sync>;

/// A mock backend for testing synthesis and retry behavior
pub struct MockBackend {
    /// Number of calls to fail before succeeding (usize::MAX = always fail)
    fail_count: usize,
    /// Error message on failure
    fail_with: String,
    /// Texts containing this marker always fail
    fail_marker: Option<String>,
    /// Duration written into every segment
    duration_seconds: f64,
    /// Per-call durations, used in call order before falling back to `duration_seconds`
    durations: Vec<f64>,
    /// Per-text artificial latency
    latency: Option<LatencyFn>,
    call_count: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockBackend {
    /// Create a backend that always succeeds with fixed-duration segments
    pub fn always_succeeds(duration_seconds: f64) -> Self {
        Self {
            fail_count: 0,
            fail_with: String::new(),
            fail_marker: None,
            duration_seconds,
            durations: Vec::new(),
            latency: None,
            call_count: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Create a backend that fails `n` times, then succeeds
    pub fn fails_then_succeeds(n: usize, duration_seconds: f64) -> Self {
        Self {
            fail_count: n,
            fail_with: "transient engine error".to_string(),
            ..Self::always_succeeds(duration_seconds)
        }
    }

    /// Create a backend that always fails with the given message
    pub fn always_fails(message: &str) -> Self {
        Self {
            fail_count: usize::MAX,
            fail_with: message.to_string(),
            ..Self::always_succeeds(0.0)
        }
    }

    /// Fail every request whose text contains `marker`
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    /// Give the n-th call the n-th duration
    pub fn with_durations(mut self, durations: Vec<f64>) -> Self {
        self.durations = durations;
        self
    }

    /// Delay each request by a text-dependent amount
    pub fn with_latency(mut self, latency: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        self.latency = Some(Box::new(latency));
        self
    }

    /// Get the number of times synthesize() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping synthesize() calls seen
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TtsBackend for MockBackend {
    async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(latency) = &self.latency {
            tokio::time::sleep(latency(text)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if call_num < self.fail_count {
            anyhow::bail!("{}", self.fail_with);
        }
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker.as_str()) {
                anyhow::bail!("engine rejected text containing {:?}", marker);
            }
        }

        let duration = self
            .durations
            .get(call_num)
            .copied()
            .unwrap_or(self.duration_seconds);
        let label = text.split_whitespace().collect::<Vec<_>>().join(" ");
        write_mock_media(output_path, duration, &[label.as_str()])
    }

    fn extension(&self) -> &str {
        "wav"
    }

    fn name(&self) -> &str {
        "mock"
    }
}
