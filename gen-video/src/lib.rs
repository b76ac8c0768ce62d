//! gen-video - Turn text into a narrated video
//!
//! Text is split into TTS-sized chunks, each chunk is synthesized to speech,
//! the segments are joined into one track, and a caption image is held for
//! the full length of that track in the output video.

pub mod audio;
pub mod caption;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod text;
pub mod tts;
pub mod video;

pub use config::GenVideoConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{NarrationOutput, Pipeline, Progress, Stage};
