//! Error taxonomy for a narration run.

use crate::pipeline::{InvalidTransition, Stage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Speech synthesis failed for chunk {index}: {source:#}")]
    Synthesis {
        index: usize,
        source: anyhow::Error,
    },

    #[error("Audio assembly failed: {0:#}")]
    Assembly(anyhow::Error),

    #[error("Caption rendering failed: {0:#}")]
    Render(anyhow::Error),

    #[error("Video composition failed: {0:#}")]
    Composition(anyhow::Error),

    #[error("Cleanup of temporary artifacts failed: {0}")]
    Cleanup(#[source] std::io::Error),

    #[error("Run cancelled during {stage}")]
    Cancelled { stage: Stage },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Run workspace error: {0:#}")]
    Workspace(anyhow::Error),

    #[error("Failed to publish outputs: {0:#}")]
    Publish(anyhow::Error),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

impl PipelineError {
    pub fn synthesis(index: usize, source: impl Into<anyhow::Error>) -> Self {
        Self::Synthesis {
            index,
            source: source.into(),
        }
    }

    pub fn assembly(source: impl Into<anyhow::Error>) -> Self {
        Self::Assembly(source.into())
    }

    pub fn render(source: impl Into<anyhow::Error>) -> Self {
        Self::Render(source.into())
    }

    pub fn composition(source: impl Into<anyhow::Error>) -> Self {
        Self::Composition(source.into())
    }

    /// Whether this error stopped the run (everything but cleanup does).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Cleanup(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
