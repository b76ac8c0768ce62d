//! Final video: the caption frame held for the length of the narration.

pub mod compositor;

pub use compositor::compose;

use std::path::PathBuf;

/// The muxed video produced by a run.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoArtifact {
    pub path: PathBuf,
    /// Always equal to the audio track duration
    pub duration_seconds: f64,
    pub frame_rate: u32,
    pub video_codec: String,
    pub audio_codec: String,
}
