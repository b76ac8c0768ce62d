//! FFmpeg-backed media encoder.

use super::{MediaEncoder, StillVideoJob};
use crate::config::FfmpegConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Runs the `ffmpeg` and `ffprobe` executables as child processes.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new(&FfmpegConfig::default())
    }
}

impl Ffmpeg {
    pub fn new(config: &FfmpegConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg.clone(),
            ffprobe: config.ffprobe.clone(),
        }
    }

    fn ffmpeg_command(&self) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    fn ffprobe_command(&self) -> Command {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    /// Check if FFmpeg is available.
    pub async fn is_ffmpeg_available(&self) -> bool {
        self.ffmpeg_command()
            .arg("-version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Check if FFprobe is available.
    pub async fn is_ffprobe_available(&self) -> bool {
        self.ffprobe_command()
            .arg("-version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

/// Arguments for reading a container duration. Errors still reach stderr.
pub fn probe_duration_args(path: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(path.to_string_lossy().into_owned());
    args
}

/// Arguments for holding a still image over an audio track.
pub fn still_video_args(job: &StillVideoJob) -> Vec<String> {
    let fps = job.frame_rate.to_string();
    let mut args: Vec<String> = [
        "-y",
        "-loglevel",
        "error",
        "-loop",
        "1",
        "-framerate",
        fps.as_str(),
        "-i",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push(job.image.to_string_lossy().into_owned());
    args.push("-i".to_string());
    args.push(job.audio.to_string_lossy().into_owned());

    args.extend(
        ["-map", "0:v", "-map", "1:a", "-c:v", job.video_codec.as_str()]
            .iter()
            .map(|s| s.to_string()),
    );
    if job.video_codec == "libx264" {
        args.extend(["-tune", "stillimage"].iter().map(|s| s.to_string()));
    }
    args.extend(
        [
            "-pix_fmt",
            "yuv420p",
            "-r",
            fps.as_str(),
            "-c:a",
            job.audio_codec.as_str(),
        ]
        .iter()
        .map(|s| s.to_string()),
    );

    // Output duration is pinned to the audio track, not to whichever stream ends first.
    args.push("-t".to_string());
    args.push(format!("{:.6}", job.duration_seconds));
    args.push("-movflags".to_string());
    args.push("+faststart".to_string());
    args.push(job.output.to_string_lossy().into_owned());
    args
}

#[async_trait]
impl MediaEncoder for Ffmpeg {
    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let output = self
            .ffprobe_command()
            .args(probe_duration_args(path))
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.ffprobe.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffprobe failed on {}: {}", path.display(), stderr.trim());
        }

        let duration_str = String::from_utf8_lossy(&output.stdout);
        let duration: f64 = duration_str
            .trim()
            .parse()
            .with_context(|| format!("Failed to parse duration {:?}", duration_str.trim()))?;

        if !duration.is_finite() || duration < 0.0 {
            anyhow::bail!("ffprobe reported invalid duration {} for {}", duration, path.display());
        }

        Ok(duration)
    }

    async fn concat(&self, manifest: &Path, output: &Path) -> Result<()> {
        debug!("ffmpeg concat {} -> {}", manifest.display(), output.display());

        let result = self
            .ffmpeg_command()
            .args(["-y", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"])
            .arg(manifest)
            .args(["-c", "copy"])
            .arg(output)
            .output()
            .await
            .with_context(|| format!("Failed to run {} concat", self.ffmpeg.display()))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            anyhow::bail!("ffmpeg concat failed ({}): {}", result.status, stderr.trim());
        }

        Ok(())
    }

    async fn encode_still(&self, job: &StillVideoJob) -> Result<()> {
        let args = still_video_args(job);
        debug!("ffmpeg {}", args.join(" "));

        let result = self
            .ffmpeg_command()
            .args(&args)
            .stdout(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.ffmpeg.display()))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            anyhow::bail!("ffmpeg exited with status {}: {}", result.status, stderr.trim());
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}
