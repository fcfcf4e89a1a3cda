//! Per-track analysis aggregation and the external analyzer boundary.
//!
//! `TrackAnalysis` is the immutable per-track record the orchestrator works
//! from (spec.md §3). `Analyzer` is the external-collaborator trait —
//! BPM/key/chorus/verse estimation are out of scope for this crate; the
//! default implementation shells out to external helper commands and parses
//! their JSON stdout, the same subprocess/JSON contract
//! `mesh-cue::analysis::python::MadmomDetector` uses against `madmom`.

use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::camelot::Camelot;
use crate::error::MixError;

/// A chorus or verse window, in seconds, on the track's own (unstretched) grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub start_sec: f64,
    pub end_sec: f64,
}

impl Section {
    pub fn new(start_sec: f64, end_sec: f64) -> Self {
        debug_assert!(start_sec < end_sec);
        Self { start_sec, end_sec }
    }

    pub fn duration(&self) -> f64 {
        self.end_sec - self.start_sec
    }
}

/// Immutable per-track analysis (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackAnalysis {
    pub bpm: f64,
    pub camelot: CamelotKey,
    pub choruses: Vec<Section>,
    pub verses: Vec<Section>,
}

/// Serializable mirror of `camelot::Camelot` (the wheel type itself carries
/// no serde derive since it is a pure value used hot in compatibility
/// checks; this is the wire/cache shape).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CamelotKey {
    pub number: u8,
    pub letter: char,
}

impl From<Camelot> for CamelotKey {
    fn from(c: Camelot) -> Self {
        Self {
            number: c.number,
            letter: c.letter(),
        }
    }
}

impl TryFrom<CamelotKey> for Camelot {
    type Error = MixError;

    fn try_from(k: CamelotKey) -> Result<Self, MixError> {
        let ring = match k.letter {
            'A' => crate::camelot::Ring::Minor,
            'B' => crate::camelot::Ring::Major,
            _ => {
                return Err(MixError::UnknownKey {
                    pitch: k.number.to_string(),
                    mode: k.letter.to_string(),
                })
            }
        };
        Ok(Camelot::new(k.number, ring))
    }
}

/// Validates a raw BPM reading is within spec.md §6's `[60, 200]` contract,
/// rounding to 2 decimals as the data model requires.
pub fn validate_bpm(bpm: f64) -> Result<f64, MixError> {
    if !(60.0..=200.0).contains(&bpm) {
        return Err(MixError::BpmOutOfRange { bpm });
    }
    Ok((bpm * 100.0).round() / 100.0)
}

/// External analyzer contract (spec.md §6): BPM, key, chorus/verse detection.
/// Pure functions over a track path; out of scope to reimplement, specified
/// here as a trait so the core never depends on a concrete estimator.
pub trait Analyzer {
    fn bpm(&self, path: &Path) -> Result<f64, MixError>;
    fn key(&self, path: &Path) -> Result<Camelot, MixError>;
    fn choruses(&self, path: &Path) -> Result<Vec<Section>, MixError>;
    fn verses(&self, path: &Path) -> Result<Vec<Section>, MixError>;

    fn analyze(&self, path: &Path) -> Result<TrackAnalysis, MixError> {
        Ok(TrackAnalysis {
            bpm: self.bpm(path)?,
            camelot: self.key(path)?.into(),
            choruses: self.choruses(path)?,
            verses: self.verses(path)?,
        })
    }
}

/// Shells out to configurable external commands, each expected to print a
/// single JSON value to stdout. Mirrors `MadmomDetector`'s
/// `Command::new(...).output()` + `serde_json::from_slice` pattern.
pub struct SubprocessAnalyzer {
    pub bpm_cmd: String,
    pub key_cmd: String,
    pub choruses_cmd: String,
    pub verses_cmd: String,
}

impl SubprocessAnalyzer {
    pub fn new(bpm_cmd: &str, key_cmd: &str, choruses_cmd: &str, verses_cmd: &str) -> Self {
        Self {
            bpm_cmd: bpm_cmd.to_string(),
            key_cmd: key_cmd.to_string(),
            choruses_cmd: choruses_cmd.to_string(),
            verses_cmd: verses_cmd.to_string(),
        }
    }

    fn run_json(&self, cmd: &str, path: &Path) -> Result<serde_json::Value, MixError> {
        let output = Command::new(cmd)
            .arg(path)
            .output()
            .map_err(MixError::IoError)?;
        if !output.status.success() {
            return Err(MixError::DecodeError(format!(
                "{cmd} exited with {}",
                output.status
            )));
        }
        serde_json::from_slice(&output.stdout)
            .map_err(|e| MixError::DecodeError(format!("{cmd} produced invalid JSON: {e}")))
    }

    fn run_sections(&self, cmd: &str, path: &Path) -> Result<Vec<Section>, MixError> {
        let value = self.run_json(cmd, path)?;
        let pairs: Vec<(f64, f64)> = serde_json::from_value(value)
            .map_err(|e| MixError::DecodeError(format!("{cmd} section list malformed: {e}")))?;
        Ok(pairs.into_iter().map(|(s, e)| Section::new(s, e)).collect())
    }
}

impl Analyzer for SubprocessAnalyzer {
    fn bpm(&self, path: &Path) -> Result<f64, MixError> {
        let value = self.run_json(&self.bpm_cmd, path)?;
        let raw = value
            .as_f64()
            .ok_or_else(|| MixError::DecodeError("bpm command did not return a number".into()))?;
        validate_bpm(raw)
    }

    fn key(&self, path: &Path) -> Result<Camelot, MixError> {
        let value = self.run_json(&self.key_cmd, path)?;
        let (pitch, mode): (String, String) = serde_json::from_value(value)
            .map_err(|e| MixError::DecodeError(format!("key command malformed: {e}")))?;
        Camelot::parse_key_name(&pitch, &mode)
    }

    fn choruses(&self, path: &Path) -> Result<Vec<Section>, MixError> {
        self.run_sections(&self.choruses_cmd, path)
    }

    fn verses(&self, path: &Path) -> Result<Vec<Section>, MixError> {
        self.run_sections(&self.verses_cmd, path)
    }
}
