//! Phrase/bar sample arithmetic on the unified grid.
//!
//! Once a track's stems have been stretched to `target_bpm` and resampled to
//! `target_sr`, every downstream timestamp is expressed in samples of that
//! single grid. These are the pure conversions transition builders and the
//! loop builder share: seconds to samples, and snapping a timestamp forward
//! to the next phrase boundary.

/// A bar is 4 beats at `target_bpm`; a phrase is 8 bars (32 beats).
#[derive(Debug, Clone, Copy)]
pub struct Grid {
    pub target_bpm: f64,
    pub target_sr: u32,
}

impl Grid {
    pub fn new(target_bpm: f64, target_sr: u32) -> Self {
        Self { target_bpm, target_sr }
    }

    pub fn bar_dur(&self) -> f64 {
        4.0 * 60.0 / self.target_bpm
    }

    pub fn phrase_dur(&self) -> f64 {
        8.0 * self.bar_dur()
    }

    pub fn bar_samp(&self) -> usize {
        (self.bar_dur() * self.target_sr as f64).round() as usize
    }

    pub fn phrase_samp(&self) -> usize {
        (self.phrase_dur() * self.target_sr as f64).round() as usize
    }

    /// `sec_to_samp(t) = round(t * sr)`.
    pub fn sec_to_samp(&self, t: f64) -> usize {
        (t * self.target_sr as f64).round() as usize
    }

    /// `snap_to_phrase(t) = ceil(t / phrase_dur) * phrase_dur`.
    pub fn snap_to_phrase(&self, t: f64) -> f64 {
        let phrase_dur = self.phrase_dur();
        (t / phrase_dur).ceil() * phrase_dur
    }

    /// Snaps a sample index up to the next phrase boundary, the sample-grid
    /// equivalent of `snap_to_phrase` for anchors already expressed in
    /// samples rather than seconds.
    pub fn snap_samp_to_phrase(&self, t_samp: usize) -> usize {
        let phrase_samp = self.phrase_samp().max(1);
        t_samp.div_ceil(phrase_samp) * phrase_samp
    }

    /// Converts a timestamp measured on a stretched track's original grid
    /// (before stretching) onto the unified grid: divide by `stretch_rate`
    /// before converting to samples, per spec.md §4.1 invariant 2.
    pub fn stretched_sec_to_samp(&self, t: f64, stretch_rate: f64) -> usize {
        self.sec_to_samp(t / stretch_rate)
    }
}
