//! Per-run working directory for intermediate files.

use crate::error::PipelineError;
use anyhow::{Context, Result};
use chrono::Utc;
use log::debug;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Short SHA-256 fingerprint of the input text (first 16 hex characters).
pub fn text_fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)[..16].to_string()
}

/// Run identifier: timestamp plus input fingerprint.
pub fn run_id(text: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}", timestamp, text_fingerprint(text))
}

/// A uniquely named directory removed when the run ends.
pub struct RunWorkspace {
    dir: TempDir,
    run_id: String,
}

impl RunWorkspace {
    /// Create `gen-video-<run id>-XXXXXX` under `base` (system temp dir if None).
    pub fn create(text: &str, base: Option<&Path>) -> Result<Self> {
        let run_id = run_id(text);
        let prefix = format!("gen-video-{}-", run_id);
        let base: PathBuf = base.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);

        std::fs::create_dir_all(&base)
            .with_context(|| format!("Failed to create work directory {}", base.display()))?;
        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(&base)
            .with_context(|| format!("Failed to create run workspace in {}", base.display()))?;

        debug!("Run workspace: {}", dir.path().display());
        Ok(Self { dir, run_id })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Path of a file inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the workspace and everything left in it.
    pub fn close(self) -> std::result::Result<(), PipelineError> {
        self.dir.close().map_err(PipelineError::Cleanup)
    }
}
