//! Audio/video encode collaborator: duration probing, concatenation, still-image encoding.

pub mod ffmpeg;
pub mod mock;

pub use ffmpeg::Ffmpeg;
pub use mock::MockEncoder;

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Everything needed to hold one image for the length of an audio track.
#[derive(Debug, Clone)]
pub struct StillVideoJob {
    /// The frame shown for the whole duration
    pub image: PathBuf,
    /// The audio track to mux
    pub audio: PathBuf,
    /// How long the output lasts, in seconds
    pub duration_seconds: f64,
    pub frame_rate: u32,
    pub video_codec: String,
    pub audio_codec: String,
    pub output: PathBuf,
}

/// Media encoder trait - the pipeline never shells out except through this.
#[async_trait]
pub trait MediaEncoder: Send + Sync {
    /// Duration of a media file in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64>;

    /// Concatenate the files listed in a concat manifest without re-encoding.
    ///
    /// The manifest holds one `file '<path>'` line per input, in playback order.
    async fn concat(&self, manifest: &Path, output: &Path) -> Result<()>;

    /// Encode a still-image video muxed with an audio track.
    async fn encode_still(&self, job: &StillVideoJob) -> Result<()>;

    /// Encoder name for display.
    fn name(&self) -> &str;
}

/// Quote a path for a concat manifest line.
pub fn manifest_line(path: &Path) -> String {
    // Escape single quotes in path
    let path_str = path.to_string_lossy().replace('\'', "'\\''");
    format!("file '{}'\n", path_str)
}

/// Parse the paths back out of a concat manifest.
pub fn parse_manifest(content: &str) -> Vec<PathBuf> {
    content
        .lines()
        .filter_map(|line| {
            line.trim()
                .strip_prefix("file '")
                .and_then(|rest| rest.strip_suffix('\''))
        })
        .map(|quoted| PathBuf::from(quoted.replace("'\\''", "'")))
        .collect()
}
