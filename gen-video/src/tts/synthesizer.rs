//! Per-chunk synthesis into audio segment files.

use super::TtsBackend;
use crate::audio::AudioSegment;
use crate::error::{PipelineError, Result};
use crate::media::MediaEncoder;
use crate::pipeline::Stage;
use crate::text::TextChunk;
use anyhow::Context;
use futures_util::stream::{self, StreamExt};
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Turns text chunks into audio segments in a segment directory.
pub struct Synthesizer {
    backend: Arc<dyn TtsBackend>,
    encoder: Arc<dyn MediaEncoder>,
    segment_dir: PathBuf,
    max_retries: u32,
    concurrency: usize,
}

impl Synthesizer {
    pub fn new(
        backend: Arc<dyn TtsBackend>,
        encoder: Arc<dyn MediaEncoder>,
        segment_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            encoder,
            segment_dir: segment_dir.into(),
            max_retries: 0,
            concurrency: 1,
        }
    }

    /// Extra attempts per chunk after the first failure.
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Number of chunks synthesized at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Where the segment for chunk `index` is written.
    pub fn segment_path(&self, index: usize) -> PathBuf {
        self.segment_dir
            .join(format!("segment_{:04}.{}", index, self.backend.extension()))
    }

    /// Synthesize one chunk and measure the result.
    pub async fn synthesize(&self, chunk: &TextChunk) -> Result<AudioSegment> {
        if chunk.is_blank() {
            return Err(PipelineError::synthesis(
                chunk.index,
                anyhow::anyhow!("chunk has no speakable text"),
            ));
        }

        let path = self.segment_path(chunk.index);
        debug!(
            "Synthesizing chunk {} ({} chars) with {}",
            chunk.index,
            chunk.word_len(),
            self.backend.name()
        );

        self.backend
            .synthesize_with_retry(chunk.spoken(), &path, self.max_retries)
            .await
            .map_err(|e| PipelineError::synthesis(chunk.index, e))?;

        let duration_seconds = self
            .encoder
            .probe_duration(&path)
            .await
            .with_context(|| format!("Failed to measure {}", path.display()))
            .map_err(|e| PipelineError::synthesis(chunk.index, e))?;

        Ok(AudioSegment {
            source_chunk_index: chunk.index,
            path,
            duration_seconds,
        })
    }

    /// Synthesize every chunk, returning segments in chunk order.
    ///
    /// Up to `concurrency` chunks are in flight; completed results are
    /// resequenced before being handed back. `on_progress(completed, total)`
    /// is called after each segment. The token is checked before each chunk
    /// starts and after each one completes.
    pub async fn synthesize_all<F>(
        &self,
        chunks: &[TextChunk],
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<Vec<AudioSegment>>
    where
        F: FnMut(usize, usize),
    {
        let total = chunks.len();
        let cancelled = || PipelineError::Cancelled {
            stage: Stage::Synthesizing,
        };

        let mut results = stream::iter(chunks)
            .map(|chunk| async move {
                if cancel.is_cancelled() {
                    return Err(cancelled());
                }
                self.synthesize(chunk).await
            })
            .buffered(self.concurrency);

        let mut segments = Vec::with_capacity(total);
        while let Some(result) = results.next().await {
            segments.push(result?);
            on_progress(segments.len(), total);

            if segments.len() < total && cancel.is_cancelled() {
                return Err(cancelled());
            }
        }

        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockEncoder;
    use crate::media::mock::read_mock_media;
    use crate::tts::MockBackend;
    use std::time::Duration;
    use tempfile::TempDir;

    fn chunks(texts: &[&str]) -> Vec<TextChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| TextChunk::new(i, *t))
            .collect()
    }

    #[tokio::test]
    async fn test_synthesize_single_chunk() {
        let dir = TempDir::new().unwrap();
        let synth = Synthesizer::new(
            Arc::new(MockBackend::always_succeeds(3.0)),
            Arc::new(MockEncoder::new()),
            dir.path(),
        );

        let segment = synth.synthesize(&TextChunk::new(7, "  Hello world ")).await.unwrap();
        assert_eq!(segment.source_chunk_index, 7);
        assert_eq!(segment.duration_seconds, 3.0);
        assert_eq!(segment.path, dir.path().join("segment_0007.wav"));

        let (_, labels) = read_mock_media(&segment.path).unwrap();
        assert_eq!(labels, vec!["Hello world"]);
    }

    #[tokio::test]
    async fn test_blank_chunk_fails() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::always_succeeds(1.0));
        let synth = Synthesizer::new(backend.clone(), Arc::new(MockEncoder::new()), dir.path());

        let err = synth.synthesize(&TextChunk::new(0, "   ")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Synthesis { index: 0, .. }));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_retries_are_applied() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::fails_then_succeeds(1, 1.0));
        let synth = Synthesizer::new(backend.clone(), Arc::new(MockEncoder::new()), dir.path())
            .with_retries(1);

        synth.synthesize(&TextChunk::new(0, "hi")).await.unwrap();
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_results_stay_ordered() {
        let dir = TempDir::new().unwrap();
        // Earlier chunks take longer, so they finish last
        let backend = Arc::new(MockBackend::always_succeeds(1.0).with_latency(|text| {
            let n: u64 = text.trim_start_matches("chunk ").parse().unwrap_or(0);
            Duration::from_millis(60 - n * 10)
        }));
        let synth = Synthesizer::new(backend.clone(), Arc::new(MockEncoder::new()), dir.path())
            .with_concurrency(4);

        let input = chunks(&["chunk 0", "chunk 1", "chunk 2", "chunk 3", "chunk 4"]);
        let mut progress = Vec::new();
        let segments = synth
            .synthesize_all(&input, &CancellationToken::new(), |done, total| {
                progress.push((done, total))
            })
            .await
            .unwrap();

        let order: Vec<usize> = segments.iter().map(|s| s.source_chunk_index).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        assert_eq!(progress, vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]);
        assert!(backend.peak_in_flight() > 1);
        assert!(backend.peak_in_flight() <= 4);
    }

    #[tokio::test]
    async fn test_failure_reports_chunk_index() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::always_succeeds(1.0).failing_on("BROKEN"));
        let synth = Synthesizer::new(backend, Arc::new(MockEncoder::new()), dir.path());

        let input = chunks(&["fine", "BROKEN text", "never reached"]);
        let err = synth
            .synthesize_all(&input, &CancellationToken::new(), |_, _| {})
            .await
            .unwrap_err();
        match err {
            PipelineError::Synthesis { index, source } => {
                assert_eq!(index, 1);
                assert!(source.to_string().contains("BROKEN"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_cancellation_between_chunks() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::always_succeeds(1.0));
        let synth = Synthesizer::new(backend.clone(), Arc::new(MockEncoder::new()), dir.path());

        let cancel = CancellationToken::new();
        let input = chunks(&["one", "two", "three"]);
        let err = synth
            .synthesize_all(&input, &cancel, |done, _| {
                if done == 1 {
                    cancel.cancel();
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Cancelled {
                stage: Stage::Synthesizing
            }
        ));
        assert_eq!(backend.call_count(), 1);
    }
}
