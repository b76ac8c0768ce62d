//! Audio segments and their assembly into one continuous track.

pub mod assembler;

pub use assembler::assemble;

use std::path::PathBuf;

/// Synthesized speech for one text chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    /// Index of the chunk this was synthesized from
    pub source_chunk_index: usize,
    pub path: PathBuf,
    pub duration_seconds: f64,
}

/// The single continuous narration track of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub path: PathBuf,
    pub duration_seconds: f64,
}
