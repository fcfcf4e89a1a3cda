//! Tight transition and its short-chorus fallback (spec.md §4.4(a)/(b)).
//!
//! Grounded on `examples/original_source/many_transitions.py`'s
//! `_build_tight_transition` and `_build_tight_fallback`, translated from
//! numpy array slicing into `AudioBuffer` slicing and `add_assign_scaled`.

use crate::mix::{fade_in, fade_out, TrackBands};
use crate::types::AudioBuffer;

/// Anchors needed by the tight builder, all in samples on the unified grid
/// (spec.md §4.4).
#[derive(Debug, Clone, Copy)]
pub struct TightAnchors {
    pub s1_v1_start: usize,
    pub s1_c1_start: usize,
    pub s1_c1_end: usize,
    pub s2_c1_start: usize,
    pub s2_v2_end: usize,
}

/// Whether the full tight transition fit, or the short-chorus fallback
/// (spec.md §4.4(b)) was used — `n_chorus_phrases < 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TightVariant {
    Full,
    Fallback,
}

pub struct TightResult {
    pub audio: AudioBuffer,
    pub variant: TightVariant,
    /// Sample index, relative to the prefix start, where Phase A begins —
    /// used by the orchestrator to compute the canonical output timestamp.
    pub trans_start: usize,
}

/// Builds the tight transition (or its fallback), dispatching on
/// `n_chorus_phrases = floor((s1_c1_end - s1_c1_start) / phrase_samp)`
/// (spec.md §4.4: "Requires n_chorus_phrases >= 2" for the full variant).
///
/// `track_a_raw` is track A's original decoded audio (spec.md §4.4: "Prefix:
/// raw track A") — the prefix is cut from it, not from the summed bands.
pub fn build(
    track_a: &TrackBands,
    track_b: &TrackBands,
    track_a_raw: &AudioBuffer,
    anchors: TightAnchors,
    phrase_samp: usize,
) -> TightResult {
    let chorus_len = anchors.s1_c1_end - anchors.s1_c1_start;
    let n_chorus_phrases = chorus_len / phrase_samp;

    if n_chorus_phrases >= 2 {
        build_full(track_a, track_b, track_a_raw, anchors, phrase_samp, n_chorus_phrases)
    } else {
        build_fallback(track_a, track_b, track_a_raw, anchors, phrase_samp)
    }
}

#[allow(clippy::too_many_arguments)]
fn build_full(
    track_a: &TrackBands,
    track_b: &TrackBands,
    track_a_raw: &AudioBuffer,
    anchors: TightAnchors,
    phrase_samp: usize,
    n_chorus_phrases: usize,
) -> TightResult {
    let trans_start = anchors.s1_c1_start + (n_chorus_phrases - 2) * phrase_samp;
    let sr = track_a.sample_rate();

    let mut out = AudioBuffer::from_stereo_samples(
        track_a_raw.slice(anchors.s1_v1_start, trans_start).to_vec(),
        sr,
    );

    let fade_out_ramp = fade_out(phrase_samp);
    let fade_in_ramp = fade_in(phrase_samp);

    let low1 = track_a.low.slice(trans_start, trans_start + phrase_samp);
    let low2 = track_b
        .low
        .slice(anchors.s2_c1_start, anchors.s2_c1_start + phrase_samp);
    let mid1 = track_a.mid.slice(trans_start, trans_start + phrase_samp);
    let high1 = track_a.high.slice(trans_start, trans_start + phrase_samp);

    let mut phase_a = AudioBuffer::silence(phrase_samp, sr);
    phase_a.add_assign_scaled(low1, &fade_out_ramp);
    phase_a.add_assign_scaled(low2, &fade_in_ramp);
    phase_a.add_assign_slice(mid1);
    phase_a.add_assign_slice(high1);
    out.append(phase_a.as_slice());

    let after_start = anchors.s2_c1_start + phrase_samp;
    let after = track_b.sum_slice(after_start, anchors.s2_v2_end);
    out.append(after.as_slice());

    TightResult {
        audio: out,
        variant: TightVariant::Full,
        trans_start: trans_start - anchors.s1_v1_start,
    }
}

fn build_fallback(
    track_a: &TrackBands,
    track_b: &TrackBands,
    track_a_raw: &AudioBuffer,
    anchors: TightAnchors,
    phrase_samp: usize,
) -> TightResult {
    let trans_start = anchors.s1_c1_end;
    let sr = track_a.sample_rate();

    let mut out = AudioBuffer::from_stereo_samples(
        track_a_raw.slice(anchors.s1_v1_start, trans_start).to_vec(),
        sr,
    );

    let fade_out_ramp = fade_out(phrase_samp);
    let fade_in_ramp = fade_in(phrase_samp);

    let low1 = track_a.low.slice(trans_start, trans_start + phrase_samp);
    let mid2 = track_b
        .mid
        .slice(anchors.s2_c1_start, anchors.s2_c1_start + phrase_samp);
    let high2 = track_b
        .high
        .slice(anchors.s2_c1_start, anchors.s2_c1_start + phrase_samp);

    // Track B's lows are held at zero through Phase A (no low2 term) — this
    // is the open question resolved in favor of the original's behavior.
    let mut phase_a = AudioBuffer::silence(phrase_samp, sr);
    phase_a.add_assign_scaled(low1, &fade_out_ramp);
    phase_a.add_assign_scaled(mid2, &fade_in_ramp);
    phase_a.add_assign_scaled(high2, &fade_in_ramp);
    out.append(phase_a.as_slice());

    let after_start = anchors.s2_c1_start + phrase_samp;
    let after = track_b.sum_slice(after_start, anchors.s2_v2_end);
    out.append(after.as_slice());

    TightResult {
        audio: out,
        variant: TightVariant::Fallback,
        trans_start: trans_start - anchors.s1_v1_start,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stems::StemSet;
    use crate::types::StereoSample;

    fn flat_stems(value: f32, len: usize, sr: u32) -> StemSet {
        let buf = || AudioBuffer::from_stereo_samples(vec![StereoSample::new(value, value); len], sr);
        StemSet {
            bass: buf(),
            drums: buf(),
            vocals: buf(),
            other: buf(),
        }
    }

    #[test]
    fn full_variant_chosen_with_long_enough_chorus() {
        let phrase_samp = 100;
        let sr = 44_100;
        let stems_a = flat_stems(0.1, 10_000, sr);
        let stems_b = flat_stems(0.2, 10_000, sr);
        let a = TrackBands::from_stems(&stems_a);
        let b = TrackBands::from_stems(&stems_b);
        let raw_a = AudioBuffer::from_stereo_samples(vec![StereoSample::new(0.1, 0.1); 10_000], sr);

        let anchors = TightAnchors {
            s1_v1_start: 0,
            s1_c1_start: 1000,
            s1_c1_end: 1000 + 3 * phrase_samp,
            s2_c1_start: 500,
            s2_v2_end: 9000,
        };
        let result = build(&a, &b, &raw_a, anchors, phrase_samp);
        assert_eq!(result.variant, TightVariant::Full);
    }

    #[test]
    fn fallback_variant_chosen_with_short_chorus() {
        let phrase_samp = 100;
        let sr = 44_100;
        let stems_a = flat_stems(0.1, 10_000, sr);
        let stems_b = flat_stems(0.2, 10_000, sr);
        let a = TrackBands::from_stems(&stems_a);
        let b = TrackBands::from_stems(&stems_b);
        let raw_a = AudioBuffer::from_stereo_samples(vec![StereoSample::new(0.1, 0.1); 10_000], sr);

        let anchors = TightAnchors {
            s1_v1_start: 0,
            s1_c1_start: 1000,
            s1_c1_end: 1000 + phrase_samp + 10,
            s2_c1_start: 500,
            s2_v2_end: 9000,
        };
        let result = build(&a, &b, &raw_a, anchors, phrase_samp);
        assert_eq!(result.variant, TightVariant::Fallback);
    }

    #[test]
    fn phase_a_fade_law_holds() {
        let phrase_samp = 50;
        let fo = fade_out(phrase_samp);
        let fi = fade_in(phrase_samp);
        for i in 0..phrase_samp {
            assert!((fo[i] + fi[i] - 1.0).abs() < 1e-6);
        }
    }
}
