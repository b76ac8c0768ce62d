//! Local TTS engine driven as a child process (espeak-ng, piper, say, ...).
//!
//! The text is written to the program's stdin. Any argument containing
//! `{output}` has it replaced with the path the audio must be written to.

use super::TtsBackend;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Placeholder substituted with the segment path.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

pub struct CommandBackend {
    program: String,
    args: Vec<String>,
    extension: String,
}

impl CommandBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>, extension: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args,
            extension: extension.into(),
        }
    }

    /// Arguments with the output placeholder filled in.
    fn resolved_args(&self, output_path: &Path) -> Vec<String> {
        let output = output_path.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace(OUTPUT_PLACEHOLDER, &output))
            .collect()
    }
}

#[async_trait]
impl TtsBackend for CommandBackend {
    async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()> {
        let args = self.resolved_args(output_path);
        debug!("{} {} ({} chars on stdin)", self.program, args.join(" "), text.chars().count());

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.program))?;

        {
            let mut stdin = child
                .stdin
                .take()
                .with_context(|| format!("Failed to open stdin of {}", self.program))?;
            stdin
                .write_all(text.as_bytes())
                .await
                .with_context(|| format!("Failed to send text to {}", self.program))?;
        }

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("Failed to wait for {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{} exited with {}: {}", self.program, output.status, stderr.trim());
        }

        if !output_path.exists() {
            anyhow::bail!("{} did not write {}", self.program, output_path.display());
        }

        Ok(())
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn name(&self) -> &str {
        &self.program
    }
}
