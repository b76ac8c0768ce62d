//! gen-video - Turn text into a narrated video with a caption frame

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gen_video::caption::CaptionRenderer;
use gen_video::media::Ffmpeg;
use gen_video::tts::create_backend;
use gen_video::{GenVideoConfig, Pipeline, Progress};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "gen-video")]
#[command(about = "Turn text into a narrated video with a caption frame", long_about = None)]
#[command(version)]
struct Args {
    /// Text file to narrate ("-" or omitted reads stdin)
    text_file: Option<PathBuf>,

    /// Output directory (default from config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum characters per TTS chunk
    #[arg(long)]
    max_chars: Option<usize>,

    /// Video frame rate
    #[arg(long)]
    fps: Option<u32>,

    /// Output file name without extension
    #[arg(long)]
    stem: Option<String>,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Check that ffmpeg, ffprobe and a caption font are available
    Check,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Write the default configuration file
    Init,
    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match &args.command {
        Some(Commands::Config { action }) => return handle_config_command(action),
        Some(Commands::Check) => return run_check().await,
        None => {}
    }

    let mut config = GenVideoConfig::load().context("Failed to load configuration")?;
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if let Some(max_chars) = args.max_chars {
        config.max_chars = max_chars;
    }
    if let Some(fps) = args.fps {
        config.video.frame_rate = fps;
    }
    if let Some(stem) = &args.stem {
        config.output_stem = stem.clone();
    }

    let text = read_input(args.text_file.as_ref())?;

    let backend = create_backend(&config.tts).context("Failed to set up TTS backend")?;
    let encoder = Arc::new(Ffmpeg::new(&config.ffmpeg));
    eprintln!("TTS backend: {}", backend.name());

    let pipeline = Pipeline::new(config, backend, encoder)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling...");
                cancel.cancel();
            }
        });
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );

    let result = pipeline
        .run_with(&text, &cancel, |event| match event {
            Progress::Stage(stage) => pb.set_message(stage.label()),
            Progress::Chunk { completed, total } => {
                pb.set_length(total as u64);
                pb.set_position(completed as u64);
            }
        })
        .await;
    pb.finish_and_clear();

    let output = result?;
    eprintln!(
        "Chunks: {}, duration: {:.1}s",
        output.chunk_count, output.video.duration_seconds
    );
    eprintln!("Audio: {}", output.audio.path.display());
    eprintln!("Video: {}", output.video.path.display());

    Ok(())
}

/// Read the text to narrate from a file, or stdin for None / "-".
fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

async fn run_check() -> Result<()> {
    let config = GenVideoConfig::load()?;
    let ffmpeg = Ffmpeg::new(&config.ffmpeg);
    let mut ok = true;

    if ffmpeg.is_ffmpeg_available().await {
        println!("ffmpeg: {}", config.ffmpeg.ffmpeg.display());
    } else {
        println!("ffmpeg: NOT FOUND ({})", config.ffmpeg.ffmpeg.display());
        ok = false;
    }
    if ffmpeg.is_ffprobe_available().await {
        println!("ffprobe: {}", config.ffmpeg.ffprobe.display());
    } else {
        println!("ffprobe: NOT FOUND ({})", config.ffmpeg.ffprobe.display());
        ok = false;
    }

    let renderer = CaptionRenderer::new(config.caption.clone());
    match renderer.resolve_font_family() {
        Ok(family) => println!(
            "caption font: {} ({} faces available)",
            family,
            renderer.face_count()
        ),
        Err(e) => {
            println!("caption font: {}", e);
            ok = false;
        }
    }

    if !ok {
        anyhow::bail!("Some requirements are missing");
    }
    Ok(())
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = GenVideoConfig::load()?;
            println!("Configuration file: {}", GenVideoConfig::config_path().display());
            println!();
            print!("{}", toml::to_string_pretty(&config).context("Failed to serialize configuration")?);
        }
        ConfigAction::Init => {
            let path = GenVideoConfig::config_path();
            if path.exists() {
                anyhow::bail!("Configuration already exists at {}", path.display());
            }
            GenVideoConfig::default().save()?;
            println!("Wrote default configuration to {}", path.display());
        }
        ConfigAction::Path => {
            println!("{}", GenVideoConfig::config_path().display());
        }
    }
    Ok(())
}
