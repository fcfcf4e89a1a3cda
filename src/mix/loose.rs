//! Loose transition (spec.md §4.4(c)): chorus → verse → chorus, 2 phrases,
//! band swap. Grounded on
//! `examples/original_source/many_transitions.py`'s `_build_loose_transition`.

use crate::mix::{fade_in, fade_out, TrackBands};
use crate::phrase::Grid;
use crate::types::AudioBuffer;

/// Anchors needed by the loose builder, all in samples on the unified grid.
/// Requires track A to have >= 2 verse entries (spec.md §4.4(c)).
#[derive(Debug, Clone, Copy)]
pub struct LooseAnchors {
    pub s1_v1_start: usize,
    /// `verse_a[1].start`, in samples — the second verse of track A.
    pub verse_a2_start: usize,
    pub s2_c1_start: usize,
    pub s2_v2_end: usize,
}

pub struct LooseResult {
    pub audio: AudioBuffer,
    /// Sample index, relative to the prefix start, where Phase A begins.
    pub trans_start: usize,
}

/// `trans_start = snap_to_phrase(verse_a[1].start)`.
///
/// `track_a_raw` is track A's original decoded audio — the prefix is cut
/// from it, not from the summed bands.
pub fn build(
    track_a: &TrackBands,
    track_b: &TrackBands,
    track_a_raw: &AudioBuffer,
    anchors: LooseAnchors,
    grid: Grid,
) -> LooseResult {
    let phrase_samp = grid.phrase_samp();
    let trans_start = grid.snap_samp_to_phrase(anchors.verse_a2_start);
    let sr = track_a.sample_rate();

    let mut out = AudioBuffer::from_stereo_samples(
        track_a_raw.slice(anchors.s1_v1_start, trans_start).to_vec(),
        sr,
    );

    let fade_out_ramp = fade_out(phrase_samp);
    let fade_in_ramp = fade_in(phrase_samp);

    // Phase A: low1 fades out, mid1/high1 held, low2 fades in.
    let low1_a = track_a.low.slice(trans_start, trans_start + phrase_samp);
    let mid1_a = track_a.mid.slice(trans_start, trans_start + phrase_samp);
    let high1_a = track_a.high.slice(trans_start, trans_start + phrase_samp);
    let low2_a = track_b
        .low
        .slice(anchors.s2_c1_start, anchors.s2_c1_start + phrase_samp);

    let mut phase_a = AudioBuffer::silence(phrase_samp, sr);
    phase_a.add_assign_scaled(low1_a, &fade_out_ramp);
    phase_a.add_assign_slice(mid1_a);
    phase_a.add_assign_slice(high1_a);
    phase_a.add_assign_scaled(low2_a, &fade_in_ramp);
    out.append(phase_a.as_slice());

    // Phase B: both tracks advanced by phi. mid1/high1 fade out, low2 held,
    // mid2/high2 fade in.
    let trans_b_start = trans_start + phrase_samp;
    let s2_b_start = anchors.s2_c1_start + phrase_samp;

    let mid1_b = track_a.mid.slice(trans_b_start, trans_b_start + phrase_samp);
    let high1_b = track_a.high.slice(trans_b_start, trans_b_start + phrase_samp);
    let low2_b = track_b.low.slice(s2_b_start, s2_b_start + phrase_samp);
    let mid2_b = track_b.mid.slice(s2_b_start, s2_b_start + phrase_samp);
    let high2_b = track_b.high.slice(s2_b_start, s2_b_start + phrase_samp);

    let mut phase_b = AudioBuffer::silence(phrase_samp, sr);
    phase_b.add_assign_scaled(mid1_b, &fade_out_ramp);
    phase_b.add_assign_scaled(high1_b, &fade_out_ramp);
    phase_b.add_assign_slice(low2_b);
    phase_b.add_assign_scaled(mid2_b, &fade_in_ramp);
    phase_b.add_assign_scaled(high2_b, &fade_in_ramp);
    out.append(phase_b.as_slice());

    // Tail: (low2+mid2+high2)[s2_c1_start + 2*phi : s2_v2_end].
    let tail_start = anchors.s2_c1_start + 2 * phrase_samp;
    let tail = track_b.sum_slice(tail_start, anchors.s2_v2_end);
    out.append(tail.as_slice());

    LooseResult {
        audio: out,
        trans_start: trans_start - anchors.s1_v1_start,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mix::TrackBands;
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
    fn assembled_length_matches_prefix_plus_two_phrases_plus_tail() {
        // A small sample rate keeps phrase_samp in range of the test's short
        // stem buffers while still exercising the real Grid arithmetic.
        let grid = Grid::new(128.0, 40);
        let phrase_samp = grid.phrase_samp();
        let sr = 44_100;
        let stems_a = flat_stems(0.1, 20_000, sr);
        let stems_b = flat_stems(0.2, 20_000, sr);
        let a = TrackBands::from_stems(&stems_a);
        let b = TrackBands::from_stems(&stems_b);
        let raw_a = AudioBuffer::from_stereo_samples(vec![StereoSample::new(0.1, 0.1); 20_000], sr);

        let anchors = LooseAnchors {
            s1_v1_start: 0,
            verse_a2_start: 1000,
            s2_c1_start: 500,
            s2_v2_end: 18_000,
        };
        let trans_start = grid.snap_samp_to_phrase(anchors.verse_a2_start);
        let result = build(&a, &b, &raw_a, anchors, grid);

        let expected = (trans_start - anchors.s1_v1_start)
            + 2 * phrase_samp
            + (anchors.s2_v2_end - (anchors.s2_c1_start + 2 * phrase_samp));
        assert_eq!(result.audio.len(), expected);
    }

    #[test]
    fn phase_fade_laws_hold() {
        let phrase_samp = 200;
        let fo = fade_out(phrase_samp);
        let fi = fade_in(phrase_samp);
        for i in 0..phrase_samp {
            assert!((fo[i] + fi[i] - 1.0).abs() < 1e-6);
        }
    }
}
