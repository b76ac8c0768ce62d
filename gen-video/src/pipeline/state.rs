//! Run state machine.
//!
//! ```text
//! Idle -> Chunking -> Synthesizing -> Assembling -> Rendering -> Composing -> Done
//! any non-terminal stage -> Failed
//! ```
//!
//! Stages only move forward, one step at a time; `Done` and `Failed` are
//! terminal.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Stage {
    #[default]
    Idle,
    Chunking,
    Synthesizing,
    Assembling,
    Rendering,
    Composing,
    Done,
    Failed,
}

impl Stage {
    /// The stage that follows this one on success.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Idle => Some(Stage::Chunking),
            Stage::Chunking => Some(Stage::Synthesizing),
            Stage::Synthesizing => Some(Stage::Assembling),
            Stage::Assembling => Some(Stage::Rendering),
            Stage::Rendering => Some(Stage::Composing),
            Stage::Composing => Some(Stage::Done),
            Stage::Done | Stage::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    /// A short human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Chunking => "chunking",
            Stage::Synthesizing => "synthesizing",
            Stage::Assembling => "assembling",
            Stage::Rendering => "rendering",
            Stage::Composing => "composing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid stage transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: Stage,
    pub to: Stage,
}

/// Tracks where a single run is.
#[derive(Debug, Default)]
pub struct RunState {
    stage: Stage,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Move to `to`, rejecting backward, repeated, or skipping transitions.
    pub fn advance(&mut self, to: Stage) -> Result<(), InvalidTransition> {
        let allowed = if to == Stage::Failed {
            !self.stage.is_terminal()
        } else {
            self.stage.next() == Some(to)
        };

        if !allowed {
            return Err(InvalidTransition {
                from: self.stage,
                to,
            });
        }
        self.stage = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_forward_run() {
        let mut state = RunState::new();
        for stage in [
            Stage::Chunking,
            Stage::Synthesizing,
            Stage::Assembling,
            Stage::Rendering,
            Stage::Composing,
            Stage::Done,
        ] {
            state.advance(stage).unwrap();
        }
        assert_eq!(state.stage(), Stage::Done);
        assert!(state.advance(Stage::Failed).is_err());
    }

    #[test]
    fn test_no_reentry_or_backwards() {
        let mut state = RunState::new();
        state.advance(Stage::Chunking).unwrap();
        state.advance(Stage::Synthesizing).unwrap();

        assert!(state.advance(Stage::Synthesizing).is_err());
        assert_eq!(
            state.advance(Stage::Chunking),
            Err(InvalidTransition {
                from: Stage::Synthesizing,
                to: Stage::Chunking
            })
        );
        assert!(state.advance(Stage::Composing).is_err());
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut state = RunState::new();
        state.advance(Stage::Chunking).unwrap();
        state.advance(Stage::Failed).unwrap();
        assert!(state.advance(Stage::Failed).is_err());
        assert!(state.advance(Stage::Synthesizing).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Stage::Synthesizing.to_string(), "synthesizing");
        assert_eq!(
            InvalidTransition {
                from: Stage::Done,
                to: Stage::Chunking
            }
            .to_string(),
            "invalid stage transition done -> chunking"
        );
    }
}
