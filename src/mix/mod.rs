//! Mix configuration, strategy selection, and the transition/loop builders.
//!
//! Strategy selection and the configuration derivation are unchanged from
//! spec.md §3/§4.4; grounded on `examples/original_source/many_transitions.py`'s
//! strategy dispatch (`bpm_diff`/`key_ok` thresholds, loop > tight > loose
//! priority order).

pub mod loop_builder;
pub mod loose;
pub mod tight;

use crate::camelot::{self, Camelot};
use crate::phrase::Grid;
use crate::stems::StemSet;
use crate::tempo;
use crate::types::{AudioBuffer, Sample};

/// Which builder handles the transition. `TightFallback` is a variant of
/// `Tight` chosen by the tight builder itself when the chorus is too short
/// for a full phrase (spec.md §4.4(b)); it still reports as `tight` in the
/// canonical output filename (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Loop,
    Tight,
    Loose,
}

impl Strategy {
    pub fn filename_mode(self) -> &'static str {
        match self {
            Strategy::Loop => "loop",
            Strategy::Tight => "tight",
            Strategy::Loose => "loose",
        }
    }
}

/// `bpm_loop = diff <= 10`, `bpm_tight = diff <= 5`, `bpm_loose = diff <= 15`
/// (spec.md §4.4).
pub fn bpm_diff(bpm_a: f64, bpm_b: f64) -> f64 {
    (bpm_a - bpm_b).abs()
}

/// Strategy selection (spec.md §4.4): Loop, else Tight, else Loose.
/// Totality: exactly one strategy per `(bpm_diff, key_ok)` pair (testable
/// property 6).
pub fn select_strategy(bpm_diff: f64, key_ok: bool) -> Strategy {
    let bpm_loop = bpm_diff <= 10.0;
    let bpm_tight = bpm_diff <= 5.0;
    let bpm_loose = bpm_diff <= 15.0;

    if bpm_loop && key_ok {
        Strategy::Loop
    } else if bpm_tight || (key_ok && bpm_loose) {
        Strategy::Tight
    } else {
        Strategy::Loose
    }
}

/// Mix configuration derived at dispatch (spec.md §3): the unified grid both
/// tracks are converted onto.
#[derive(Debug, Clone, Copy)]
pub struct MixConfig {
    pub target_bpm: f64,
    pub target_sr: u32,
    /// `>= 1.0` always; applies to whichever track is slower (testable
    /// property 7).
    pub stretch_rate: f64,
    pub grid: Grid,
}

impl MixConfig {
    /// `track_a_is_slower` tells the orchestrator which track's stems need
    /// stretching+resampling before slicing with these anchors.
    pub fn derive(bpm_a: f64, sr_a: u32, bpm_b: f64, sr_b: u32) -> (Self, bool) {
        let target_bpm = bpm_a.max(bpm_b);
        let track_a_is_slower = bpm_a < bpm_b;
        let target_sr = if track_a_is_slower { sr_b } else { sr_a };
        let stretch_rate = tempo::stretch_rate(bpm_a, bpm_b);
        (
            Self {
                target_bpm,
                target_sr,
                stretch_rate,
                grid: Grid::new(target_bpm, target_sr),
            },
            track_a_is_slower,
        )
    }
}

/// `key_ok = compatible(camelot_a, camelot_b)`.
pub fn key_ok(a: Camelot, b: Camelot) -> bool {
    camelot::compatible(a, b)
}

/// A linear ramp from 1.0 down to 0.0 over `len` samples (inclusive of the
/// first sample at full gain, the asymptotic end approaching silence).
/// `fade_in(len)[i] + fade_out(len)[i] == 1.0` at every sample (testable
/// property 2, fade law).
pub fn fade_out(len: usize) -> Vec<Sample> {
    if len <= 1 {
        return vec![1.0; len];
    }
    (0..len)
        .map(|i| 1.0 - i as Sample / (len - 1) as Sample)
        .collect()
}

pub fn fade_in(len: usize) -> Vec<Sample> {
    if len <= 1 {
        return vec![1.0; len];
    }
    (0..len)
        .map(|i| i as Sample / (len - 1) as Sample)
        .collect()
}

/// A track's three bands (glossary: low = bass, mid = vocals + other,
/// high = drums), already on the unified sample grid. Transition builders
/// slice and crossfade these independently per spec.md §4.4/§4.5.
pub struct TrackBands {
    pub low: AudioBuffer,
    pub mid: AudioBuffer,
    pub high: AudioBuffer,
}

impl TrackBands {
    pub fn from_stems(stems: &StemSet) -> Self {
        Self {
            low: stems.low().clone(),
            mid: stems.mid(),
            high: stems.high().clone(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.low.sample_rate
    }

    /// `low + mid + high` over `[start, end)`.
    pub fn sum_slice(&self, start: usize, end: usize) -> AudioBuffer {
        let low = self.low.slice(start, end);
        let mut out = AudioBuffer::from_stereo_samples(low.to_vec(), self.sample_rate());
        out.add_assign_slice(self.mid.slice(start, end));
        out.add_assign_slice(self.high.slice(start, end));
        out
    }
}
