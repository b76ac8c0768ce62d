//! Audio track assembly.
//!
//! Segments are joined with a stream copy through a concat manifest, so the
//! track is bit-identical to its parts apart from container framing.

use super::{AudioSegment, AudioTrack};
use crate::error::{PipelineError, Result};
use crate::media::{MediaEncoder, manifest_line};
use anyhow::Context;
use log::{debug, warn};
use std::path::Path;

/// Name of the concat manifest written next to the output track.
pub const MANIFEST_NAME: &str = "concat_list.txt";

/// Assemble ordered segments into one track at `output_path`.
///
/// `frame_seconds` is the allowed duration drift per segment boundary.
/// Segment files are removed after success and left in place on failure.
pub async fn assemble(
    segments: &[AudioSegment],
    output_path: &Path,
    encoder: &dyn MediaEncoder,
    frame_seconds: f64,
) -> Result<AudioTrack> {
    if segments.is_empty() {
        return Err(PipelineError::assembly(anyhow::anyhow!("No audio segments provided")));
    }

    for pair in segments.windows(2) {
        if pair[1].source_chunk_index <= pair[0].source_chunk_index {
            return Err(PipelineError::assembly(anyhow::anyhow!(
                "Segments out of order: chunk {} follows chunk {}",
                pair[1].source_chunk_index,
                pair[0].source_chunk_index
            )));
        }
    }

    if let [only] = segments {
        // Passthrough, no re-encode
        tokio::fs::rename(&only.path, output_path)
            .await
            .with_context(|| {
                format!("Failed to move {} to {}", only.path.display(), output_path.display())
            })
            .map_err(PipelineError::assembly)?;
        debug!("Single segment moved into place as {}", output_path.display());
        return Ok(AudioTrack {
            path: output_path.to_path_buf(),
            duration_seconds: only.duration_seconds,
        });
    }

    let work_dir = output_path.parent().unwrap_or_else(|| Path::new("."));
    let manifest = work_dir.join(MANIFEST_NAME);
    let list_content: String = segments.iter().map(|s| manifest_line(&s.path)).collect();
    tokio::fs::write(&manifest, &list_content)
        .await
        .with_context(|| format!("Failed to write {}", manifest.display()))
        .map_err(PipelineError::assembly)?;

    debug!(
        "Concatenating {} segments with {}",
        segments.len(),
        encoder.name()
    );
    encoder
        .concat(&manifest, output_path)
        .await
        .map_err(PipelineError::assembly)?;

    let duration_seconds = encoder
        .probe_duration(output_path)
        .await
        .with_context(|| format!("Failed to probe {}", output_path.display()))
        .map_err(PipelineError::assembly)?;

    let expected: f64 = segments.iter().map(|s| s.duration_seconds).sum();
    let tolerance = frame_seconds * (segments.len() - 1) as f64;
    let drift = (duration_seconds - expected).abs();
    if drift > tolerance {
        warn!(
            "Assembled track is {:.3}s but segments sum to {:.3}s (drift {:.3}s > {:.3}s)",
            duration_seconds, expected, drift, tolerance
        );
    }

    for segment in segments {
        if let Err(e) = tokio::fs::remove_file(&segment.path).await {
            warn!("Failed to remove {}: {}", segment.path.display(), e);
        }
    }
    if let Err(e) = tokio::fs::remove_file(&manifest).await {
        warn!("Failed to remove {}: {}", manifest.display(), e);
    }

    Ok(AudioTrack {
        path: output_path.to_path_buf(),
        duration_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockEncoder;
    use crate::media::mock::{read_mock_media, write_mock_media};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn segment(dir: &Path, index: usize, duration: f64) -> AudioSegment {
        let path = dir.join(format!("segment_{:04}.wav", index));
        let label = format!("chunk {}", index);
        write_mock_media(&path, duration, &[label.as_str()]).unwrap();
        AudioSegment {
            source_chunk_index: index,
            path,
            duration_seconds: duration,
        }
    }

    #[tokio::test]
    async fn test_empty_input_fails() {
        let dir = TempDir::new().unwrap();
        let encoder = MockEncoder::new();
        let err = assemble(&[], &dir.path().join("track.wav"), &encoder, 0.05)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Assembly(_)));
        assert_eq!(encoder.concat_calls(), 0);
    }

    #[tokio::test]
    async fn test_single_segment_passthrough() {
        let dir = TempDir::new().unwrap();
        let seg = segment(dir.path(), 0, 4.2);
        let original = std::fs::read(&seg.path).unwrap();
        let out = dir.path().join("track.wav");
        let encoder = MockEncoder::new();

        let track = assemble(std::slice::from_ref(&seg), &out, &encoder, 0.05)
            .await
            .unwrap();

        assert_eq!(track.duration_seconds, 4.2);
        assert_eq!(std::fs::read(&out).unwrap(), original);
        assert!(!seg.path.exists());
        assert_eq!(encoder.concat_calls(), 0);
    }

    #[tokio::test]
    async fn test_concat_preserves_order_and_duration() {
        let dir = TempDir::new().unwrap();
        let segments = vec![
            segment(dir.path(), 0, 1.5),
            segment(dir.path(), 1, 2.0),
            segment(dir.path(), 2, 0.5),
        ];
        let out = dir.path().join("track.wav");
        let encoder = MockEncoder::new();

        let track = assemble(&segments, &out, &encoder, 0.05).await.unwrap();

        assert_eq!(track.duration_seconds, 4.0);
        let (_, labels) = read_mock_media(&out).unwrap();
        assert_eq!(labels, vec!["chunk 0", "chunk 1", "chunk 2"]);
        for seg in &segments {
            assert!(!seg.path.exists());
        }
        assert!(!dir.path().join(MANIFEST_NAME).exists());
    }

    #[tokio::test]
    async fn test_drift_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let segments = vec![segment(dir.path(), 0, 1.0), segment(dir.path(), 1, 1.0)];
        let out = dir.path().join("track.wav");
        let encoder = MockEncoder::new().with_concat_padding(0.5);

        let track = assemble(&segments, &out, &encoder, 0.05).await.unwrap();
        assert_eq!(track.duration_seconds, 2.5);
    }

    #[tokio::test]
    async fn test_out_of_order_rejected() {
        let dir = TempDir::new().unwrap();
        let segments = vec![segment(dir.path(), 1, 1.0), segment(dir.path(), 0, 1.0)];
        let encoder = MockEncoder::new();

        let err = assemble(&segments, &dir.path().join("track.wav"), &encoder, 0.05)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("out of order"));
        assert_eq!(encoder.concat_calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_keeps_segments() {
        let dir = TempDir::new().unwrap();
        let segments = vec![segment(dir.path(), 0, 1.0), segment(dir.path(), 1, 1.0)];
        let encoder = MockEncoder::new().failing_concat("ffmpeg exited with status 1: Invalid data");

        let err = assemble(&segments, &dir.path().join("track.wav"), &encoder, 0.05)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Assembly(_)));
        assert!(err.to_string().contains("Invalid data"));
        let kept: Vec<PathBuf> = segments.iter().map(|s| s.path.clone()).collect();
        assert!(kept.iter().all(|p| p.exists()));
    }
}
