//! Still-frame video composition.

use super::VideoArtifact;
use crate::audio::AudioTrack;
use crate::config::VideoConfig;
use crate::error::{PipelineError, Result};
use crate::media::{MediaEncoder, StillVideoJob};
use log::debug;
use std::path::Path;

/// Mux the caption frame with the narration track.
///
/// The output lasts exactly as long as the track. A zero-length or
/// non-finite track is rejected before the encoder runs.
pub async fn compose(
    frame_png: &Path,
    track: &AudioTrack,
    settings: &VideoConfig,
    output_path: &Path,
    encoder: &dyn MediaEncoder,
) -> Result<VideoArtifact> {
    let duration = track.duration_seconds;
    if !duration.is_finite() || duration <= 0.0 {
        return Err(PipelineError::composition(anyhow::anyhow!(
            "Audio track {} has unusable duration {}",
            track.path.display(),
            duration
        )));
    }

    let job = StillVideoJob {
        image: frame_png.to_path_buf(),
        audio: track.path.clone(),
        duration_seconds: duration,
        frame_rate: settings.frame_rate,
        video_codec: settings.video_codec.clone(),
        audio_codec: settings.audio_codec.clone(),
        output: output_path.to_path_buf(),
    };

    debug!(
        "Encoding {:.3}s still video at {} fps with {}",
        duration,
        settings.frame_rate,
        encoder.name()
    );
    encoder
        .encode_still(&job)
        .await
        .map_err(PipelineError::composition)?;

    Ok(VideoArtifact {
        path: job.output,
        duration_seconds: duration,
        frame_rate: job.frame_rate,
        video_codec: job.video_codec,
        audio_codec: job.audio_codec,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockEncoder;
    use crate::media::mock::{read_mock_media, write_mock_media};
    use tempfile::TempDir;

    fn fixtures(dir: &Path, duration: f64) -> (std::path::PathBuf, AudioTrack) {
        let frame = dir.join("frame.png");
        std::fs::write(&frame, b"png").unwrap();
        let track_path = dir.join("track.wav");
        write_mock_media(&track_path, duration, &["narration"]).unwrap();
        (
            frame,
            AudioTrack {
                path: track_path,
                duration_seconds: duration,
            },
        )
    }

    #[tokio::test]
    async fn test_artifact_matches_track_duration() {
        let dir = TempDir::new().unwrap();
        let (frame, track) = fixtures(dir.path(), 37.25);
        let out = dir.path().join("out.mp4");
        let encoder = MockEncoder::new();

        let artifact = compose(&frame, &track, &VideoConfig::default(), &out, &encoder)
            .await
            .unwrap();

        assert_eq!(artifact.duration_seconds, 37.25);
        assert_eq!(artifact.frame_rate, 24);
        assert_eq!(artifact.video_codec, "libx264");
        let (encoded, labels) = read_mock_media(&out).unwrap();
        assert_eq!(encoded, 37.25);
        assert_eq!(labels, vec!["narration"]);
        assert_eq!(encoder.jobs()[0].duration_seconds, 37.25);
    }

    #[tokio::test]
    async fn test_zero_duration_rejected_before_encode() {
        let dir = TempDir::new().unwrap();
        let (frame, track) = fixtures(dir.path(), 0.0);
        let encoder = MockEncoder::new();

        let err = compose(&frame, &track, &VideoConfig::default(), &dir.path().join("o.mp4"), &encoder)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Composition(_)));
        assert_eq!(encoder.encode_calls(), 0);
    }

    #[tokio::test]
    async fn test_nan_duration_rejected() {
        let dir = TempDir::new().unwrap();
        let (frame, mut track) = fixtures(dir.path(), 1.0);
        track.duration_seconds = f64::NAN;
        let encoder = MockEncoder::new();

        assert!(
            compose(&frame, &track, &VideoConfig::default(), &dir.path().join("o.mp4"), &encoder)
                .await
                .is_err()
        );
        assert_eq!(encoder.encode_calls(), 0);
    }

    #[tokio::test]
    async fn test_encoder_diagnostic_preserved() {
        let dir = TempDir::new().unwrap();
        let (frame, track) = fixtures(dir.path(), 2.0);
        let encoder = MockEncoder::new().failing_encode("Unknown encoder 'libx999'");
        let settings = VideoConfig {
            video_codec: "libx999".to_string(),
            ..VideoConfig::default()
        };

        let err = compose(&frame, &track, &settings, &dir.path().join("o.mp4"), &encoder)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown encoder 'libx999'"));
        assert_eq!(encoder.jobs()[0].video_codec, "libx999");
    }
}
