//! Pipeline orchestration: text in, narrated video out.
//!
//! A run goes through the stages in [`Stage`] order. Intermediate files live
//! in a per-run [`RunWorkspace`] that is removed however the run ends; the
//! audio track and video are moved to the output directory only once every
//! stage has succeeded.

pub mod state;
pub mod workspace;

pub use state::{InvalidTransition, RunState, Stage};
pub use workspace::RunWorkspace;

use crate::audio::{AudioTrack, assemble};
use crate::caption::{CaptionFrame, CaptionRenderer, FrameRenderer};
use crate::config::GenVideoConfig;
use crate::error::{PipelineError, Result};
use crate::media::MediaEncoder;
use crate::text::split;
use crate::tts::{Synthesizer, TtsBackend};
use crate::video::{VideoArtifact, compose};
use anyhow::Context;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

/// Progress events reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The run entered a stage
    Stage(Stage),
    /// A chunk finished synthesizing
    Chunk { completed: usize, total: usize },
}

/// Published results of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationOutput {
    pub audio: AudioTrack,
    pub video: VideoArtifact,
    pub chunk_count: usize,
}

pub struct Pipeline {
    config: GenVideoConfig,
    backend: Arc<dyn TtsBackend>,
    encoder: Arc<dyn MediaEncoder>,
    renderer: OnceLock<Arc<dyn FrameRenderer>>,
}

/// Output names tried before publishing gives up.
const MAX_OUTPUT_NAMES: usize = 1000;

impl Pipeline {
    /// Build a pipeline, validating the configuration.
    ///
    /// Unless [`Pipeline::with_renderer`] supplies one, captions are rendered
    /// by a [`CaptionRenderer`] built on first use.
    pub fn new(
        config: GenVideoConfig,
        backend: Arc<dyn TtsBackend>,
        encoder: Arc<dyn MediaEncoder>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            backend,
            encoder,
            renderer: OnceLock::new(),
        })
    }

    /// Replace the caption renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn FrameRenderer>) -> Self {
        self.renderer = OnceLock::from(renderer);
        self
    }

    pub fn config(&self) -> &GenVideoConfig {
        &self.config
    }

    /// Run to completion without cancellation or progress reporting.
    pub async fn run(&self, text: &str) -> Result<NarrationOutput> {
        self.run_with(text, &CancellationToken::new(), |_| {}).await
    }

    /// Run, checking `cancel` between stages and chunks and reporting progress.
    pub async fn run_with<F>(
        &self,
        text: &str,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<NarrationOutput>
    where
        F: FnMut(Progress),
    {
        if text.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "text is empty or whitespace only".to_string(),
            ));
        }

        let workspace = RunWorkspace::create(text, self.config.work_dir.as_deref())
            .map_err(PipelineError::Workspace)?;
        info!("Starting run {}", workspace.run_id());

        let mut state = RunState::new();
        let result = self
            .execute(text, &workspace, &mut state, cancel, &mut on_progress)
            .await;

        if let Err(e) = &result {
            warn!("Run {} failed during {}: {}", workspace.run_id(), state.stage(), e);
            if state.advance(Stage::Failed).is_ok() {
                on_progress(Progress::Stage(Stage::Failed));
            }
        }

        if let Err(e) = workspace.close() {
            warn!("{}", e);
        }

        result
    }

    async fn execute<F>(
        &self,
        text: &str,
        workspace: &RunWorkspace,
        state: &mut RunState,
        cancel: &CancellationToken,
        on_progress: &mut F,
    ) -> Result<NarrationOutput>
    where
        F: FnMut(Progress),
    {
        enter(state, Stage::Chunking, cancel, on_progress)?;
        let chunks = split(text, self.config.max_chars);
        info!(
            "Split {} chars into {} chunks (max {} chars)",
            text.chars().count(),
            chunks.len(),
            self.config.max_chars
        );

        enter(state, Stage::Synthesizing, cancel, on_progress)?;
        let synthesizer = Synthesizer::new(
            self.backend.clone(),
            self.encoder.clone(),
            workspace.path(),
        )
        .with_retries(self.config.tts.max_retries)
        .with_concurrency(self.config.tts.concurrency);
        let segments = synthesizer
            .synthesize_all(&chunks, cancel, |completed, total| {
                on_progress(Progress::Chunk { completed, total })
            })
            .await?;

        enter(state, Stage::Assembling, cancel, on_progress)?;
        let track_path = workspace.file(&format!("track.{}", self.backend.extension()));
        let track = assemble(
            &segments,
            &track_path,
            self.encoder.as_ref(),
            self.config.audio.frame_seconds,
        )
        .await?;
        info!("Audio track: {:.2}s", track.duration_seconds);

        enter(state, Stage::Rendering, cancel, on_progress)?;
        let frame_path = workspace.file("caption.png");
        let frame = self.render_caption(text, &frame_path).await?;
        debug!("Caption: {} lines in {}", frame.lines.len(), frame.font_family);

        enter(state, Stage::Composing, cancel, on_progress)?;
        let video_path = workspace.file("video.mp4");
        let video = compose(
            &frame_path,
            &track,
            &self.config.video,
            &video_path,
            self.encoder.as_ref(),
        )
        .await?;

        let (audio, video) = self
            .publish(track, video)
            .await
            .map_err(PipelineError::Publish)?;

        state.advance(Stage::Done)?;
        on_progress(Progress::Stage(Stage::Done));
        info!(
            "Done: {} and {} ({:.2}s)",
            audio.path.display(),
            video.path.display(),
            video.duration_seconds
        );

        Ok(NarrationOutput {
            audio,
            video,
            chunk_count: chunks.len(),
        })
    }

    async fn renderer(&self) -> Result<Arc<dyn FrameRenderer>> {
        if let Some(renderer) = self.renderer.get() {
            return Ok(renderer.clone());
        }
        // Loading system fonts scans the disk
        let caption = self.config.caption.clone();
        let built = tokio::task::spawn_blocking(move || {
            Arc::new(CaptionRenderer::new(caption)) as Arc<dyn FrameRenderer>
        })
        .await
        .map_err(|e| PipelineError::render(anyhow::Error::new(e).context("Font loading task failed")))?;
        Ok(self.renderer.get_or_init(|| built).clone())
    }

    /// Lay out and rasterize the caption on the blocking pool.
    async fn render_caption(&self, text: &str, frame_path: &Path) -> Result<CaptionFrame> {
        let renderer = self.renderer().await?;
        let text = text.to_string();
        let frame_path = frame_path.to_path_buf();
        tokio::task::spawn_blocking(move || renderer.render_to_png(&text, &frame_path))
            .await
            .map_err(|e| PipelineError::render(anyhow::Error::new(e).context("Caption task failed")))?
    }

    /// Move the finished track and video into the output directory.
    ///
    /// Existing files are never replaced: the pair goes to the first free
    /// `<stem>` / `<stem>-<n>` name.
    async fn publish(
        &self,
        track: AudioTrack,
        video: VideoArtifact,
    ) -> anyhow::Result<(AudioTrack, VideoArtifact)> {
        let output_dir = &self.config.output_dir;
        tokio::fs::create_dir_all(output_dir)
            .await
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        let (audio_out, video_out) =
            reserve_outputs(output_dir, &self.config.output_stem, self.backend.extension())
                .await?;

        if let Err(e) = move_file(&track.path, &audio_out).await {
            release(&video_out).await;
            release(&audio_out).await;
            return Err(e);
        }
        if let Err(e) = move_file(&video.path, &video_out).await {
            // Both names are ours; never leave half the outputs behind
            release(&video_out).await;
            release(&audio_out).await;
            return Err(e);
        }

        Ok((
            AudioTrack {
                path: audio_out,
                ..track
            },
            VideoArtifact {
                path: video_out,
                ..video
            },
        ))
    }
}

/// Enter `stage`, unless the run has been cancelled.
fn enter<F>(
    state: &mut RunState,
    stage: Stage,
    cancel: &CancellationToken,
    on_progress: &mut F,
) -> Result<()>
where
    F: FnMut(Progress),
{
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled { stage });
    }
    state.advance(stage)?;
    info!("Stage: {}", stage);
    on_progress(Progress::Stage(stage));
    Ok(())
}

/// Claim the first free `<stem>[-n].<audio ext>` / `<stem>[-n].mp4` pair.
///
/// Each name is created with `create_new`, so concurrent runs sharing an
/// output directory never get the same pair.
async fn reserve_outputs(
    output_dir: &Path,
    stem: &str,
    audio_ext: &str,
) -> anyhow::Result<(PathBuf, PathBuf)> {
    if audio_ext.eq_ignore_ascii_case("mp4") {
        anyhow::bail!("Audio extension 'mp4' clashes with the video output");
    }

    for n in 0..MAX_OUTPUT_NAMES {
        let name = if n == 0 {
            stem.to_string()
        } else {
            format!("{}-{}", stem, n)
        };
        let audio = output_dir.join(format!("{}.{}", name, audio_ext));
        let video = output_dir.join(format!("{}.mp4", name));

        if !claim(&audio).await? {
            continue;
        }
        if claim(&video).await? {
            if n > 0 {
                info!("{}.* already exists, publishing as {}", stem, name);
            }
            return Ok((audio, video));
        }
        release(&audio).await;
    }

    anyhow::bail!(
        "No free output name for '{}' in {}",
        stem,
        output_dir.display()
    )
}

/// Create `path` if it does not exist yet. False when it already does.
async fn claim(path: &Path) -> anyhow::Result<bool> {
    match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to create {}", path.display())),
    }
}

async fn release(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}

/// Rename, falling back to copy + remove across filesystems.
async fn move_file(from: &Path, to: &Path) -> anyhow::Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to)
        .await
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    if let Err(e) = tokio::fs::remove_file(from).await {
        debug!("Failed to remove {}: {}", from.display(), e);
    }
    Ok(())
}
