//! Error taxonomy for the mix engine.
//!
//! One flat `thiserror` enum, named variants, `#[from]` wrapping of the
//! underlying I/O error.

use std::path::PathBuf;
use thiserror::Error;

/// The error kinds a caller of `seamix` may observe, per spec.md §7. All are
/// fatal to the current mix; nothing is retried inside the core.
#[derive(Error, Debug)]
pub enum MixError {
    #[error("audio file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to decode audio: {0}")]
    DecodeError(String),

    #[error("estimated BPM {bpm} is outside the valid range [60, 200]")]
    BpmOutOfRange { bpm: f64 },

    #[error("unknown key: pitch={pitch:?} mode={mode:?}")]
    UnknownKey { pitch: String, mode: String },

    #[error("prerequisite not met: {0}")]
    PrerequisiteError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MixError>;
