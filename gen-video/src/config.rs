//! gen-video configuration: chunking, TTS backend, caption layout, encoding.

use crate::caption::Color;
use crate::error::PipelineError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Default chunk size bound in characters.
pub const DEFAULT_MAX_CHARS: usize = 4500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenVideoConfig {
    /// Upper bound on the spoken length of one TTS chunk
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Directory the finished audio and video are moved into
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// File stem for the published artifacts
    #[serde(default = "default_output_stem")]
    pub output_stem: String,

    /// Parent of the per-run workspace. None means the system temp dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,

    #[serde(default)]
    pub tts: TtsConfig,

    #[serde(default)]
    pub caption: CaptionConfig,

    #[serde(default)]
    pub video: VideoConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_output_stem() -> String {
    "narration".to_string()
}

impl Default for GenVideoConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            output_dir: default_output_dir(),
            output_stem: default_output_stem(),
            work_dir: None,
            tts: TtsConfig::default(),
            caption: CaptionConfig::default(),
            video: VideoConfig::default(),
            audio: AudioConfig::default(),
            ffmpeg: FfmpegConfig::default(),
        }
    }
}

/// Which speech engine adapter to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsBackendKind {
    /// Spawn a local program and feed it text on stdin
    Command,
    /// POST text to an HTTP speech service
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default = "default_backend")]
    pub backend: TtsBackendKind,

    /// Program for the command backend
    #[serde(default = "default_command")]
    pub command: String,

    /// Arguments for the command backend; `{output}` is replaced by the segment path
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Endpoint for the http backend
    #[serde(default = "default_url")]
    pub url: String,

    /// Language code passed to the http backend
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Request timeout for the http backend
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// File extension of the audio the backend produces
    #[serde(default = "default_format")]
    pub format: String,

    /// Extra attempts per chunk after the first failure
    #[serde(default)]
    pub max_retries: u32,

    /// Number of chunks synthesized concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_backend() -> TtsBackendKind {
    TtsBackendKind::Command
}

fn default_command() -> String {
    "espeak-ng".to_string()
}

fn default_args() -> Vec<String> {
    vec!["--stdin".to_string(), "-w".to_string(), "{output}".to_string()]
}

fn default_url() -> String {
    "http://localhost:5002/api/tts".to_string()
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_format() -> String {
    "wav".to_string()
}

fn default_concurrency() -> usize {
    1
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            command: default_command(),
            args: default_args(),
            url: default_url(),
            lang: default_lang(),
            timeout_secs: default_timeout_secs(),
            format: default_format(),
            max_retries: 0,
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Display wrap width in characters
    #[serde(default = "default_wrap_width")]
    pub wrap_width: usize,

    #[serde(default = "default_font_family")]
    pub font_family: String,

    #[serde(default = "default_font_size")]
    pub font_size: u32,

    /// Extra pixels between lines
    #[serde(default = "default_line_spacing")]
    pub line_spacing: u32,

    /// Pixels above the first line
    #[serde(default = "default_top_margin")]
    pub top_margin: u32,

    #[serde(default = "default_background")]
    pub background: Color,

    #[serde(default = "default_foreground")]
    pub foreground: Color,

    /// Extra directory scanned for .ttf/.otf/.ttc files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fonts_dir: Option<PathBuf>,
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_wrap_width() -> usize {
    40
}

fn default_font_family() -> String {
    "Arial".to_string()
}

fn default_font_size() -> u32 {
    24
}

fn default_line_spacing() -> u32 {
    5
}

fn default_top_margin() -> u32 {
    20
}

fn default_background() -> Color {
    Color::WHITE
}

fn default_foreground() -> Color {
    Color::BLACK
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            wrap_width: default_wrap_width(),
            font_family: default_font_family(),
            font_size: default_font_size(),
            line_spacing: default_line_spacing(),
            top_margin: default_top_margin(),
            background: default_background(),
            foreground: default_foreground(),
            fonts_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
}

fn default_frame_rate() -> u32 {
    24
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Allowed concatenation drift per segment boundary, in seconds
    #[serde(default = "default_frame_seconds")]
    pub frame_seconds: f64,
}

fn default_frame_seconds() -> f64 {
    0.05
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            frame_seconds: default_frame_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FfmpegConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,

    #[serde(default = "default_ffprobe")]
    pub ffprobe: PathBuf,
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

impl GenVideoConfig {
    /// Get the config file path: <config dir>/gen-video/config.toml
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gen-video")
            .join("config.toml")
    }

    /// Load config from the default location, returning defaults if the file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> std::result::Result<(), PipelineError> {
        let invalid = |msg: &str| Err(PipelineError::Config(msg.to_string()));

        if self.max_chars == 0 {
            return invalid("max_chars must be greater than zero");
        }
        if self.output_stem.trim().is_empty() {
            return invalid("output_stem must not be empty");
        }
        if self.tts.concurrency == 0 {
            return invalid("tts.concurrency must be greater than zero");
        }
        if self.tts.format.trim().is_empty() {
            return invalid("tts.format must not be empty");
        }
        if self.caption.width == 0 || self.caption.height == 0 {
            return invalid("caption width/height must be non-zero");
        }
        // yuv420p output needs even dimensions
        if self.caption.width % 2 != 0 || self.caption.height % 2 != 0 {
            return invalid("caption width/height must be even");
        }
        if self.caption.wrap_width == 0 {
            return invalid("caption.wrap_width must be greater than zero");
        }
        if self.caption.font_size == 0 {
            return invalid("caption.font_size must be greater than zero");
        }
        if self.video.frame_rate == 0 {
            return invalid("video.frame_rate must be greater than zero");
        }
        if !(self.audio.frame_seconds.is_finite() && self.audio.frame_seconds >= 0.0) {
            return invalid("audio.frame_seconds must be a non-negative number");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GenVideoConfig::default();
        assert_eq!(config.max_chars, 4500);
        assert_eq!(config.caption.width, 640);
        assert_eq!(config.caption.height, 480);
        assert_eq!(config.video.frame_rate, 24);
        assert_eq!(config.video.video_codec, "libx264");
        assert_eq!(config.video.audio_codec, "aac");
        assert_eq!(config.caption.background, Color::WHITE);
        assert_eq!(config.caption.foreground, Color::BLACK);
        assert_eq!(config.tts.max_retries, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_path() {
        let path = GenVideoConfig::config_path();
        assert!(path.ends_with("gen-video/config.toml"));
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r##"
max_chars = 200
output_stem = "story"

[tts]
backend = "http"
url = "http://tts.local/speak"
format = "mp3"
max_retries = 2
concurrency = 4

[caption]
width = 1280
height = 720
background = "#102030"
foreground = "yellow"

[video]
frame_rate = 30
"##;
        let config: GenVideoConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_chars, 200);
        assert_eq!(config.output_stem, "story");
        assert_eq!(config.tts.backend, TtsBackendKind::Http);
        assert_eq!(config.tts.url, "http://tts.local/speak");
        assert_eq!(config.tts.format, "mp3");
        assert_eq!(config.tts.max_retries, 2);
        assert_eq!(config.tts.concurrency, 4);
        assert_eq!(config.caption.width, 1280);
        assert_eq!(config.caption.background, Color::rgb(0x10, 0x20, 0x30));
        assert_eq!(config.caption.foreground, Color::rgb(255, 255, 0));
        assert_eq!(config.caption.font_size, 24);
        assert_eq!(config.video.frame_rate, 30);
        assert_eq!(config.video.audio_codec, "aac");
    }

    #[test]
    fn test_parse_empty_config() {
        let config: GenVideoConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_chars, DEFAULT_MAX_CHARS);
        assert_eq!(config.tts.backend, TtsBackendKind::Command);
        assert_eq!(config.tts.args, vec!["--stdin", "-w", "{output}"]);
        assert_eq!(config.caption.wrap_width, 40);
    }

    #[test]
    fn test_invalid_color_rejected() {
        let result: std::result::Result<GenVideoConfig, _> =
            toml::from_str("[caption]\nbackground = \"not-a-color\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_odd_canvas() {
        let mut config = GenVideoConfig::default();
        config.caption.width = 641;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("even"));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = GenVideoConfig::default();
        config.max_chars = 0;
        assert!(config.validate().is_err());

        let mut config = GenVideoConfig::default();
        config.video.frame_rate = 0;
        assert!(config.validate().is_err());

        let mut config = GenVideoConfig::default();
        config.tts.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = GenVideoConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: GenVideoConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.caption.background, config.caption.background);
        assert_eq!(parsed.tts.args, config.tts.args);
    }
}
