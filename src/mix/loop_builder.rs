//! Loop builder (spec.md §4.5): chorus-instrumental loop stitching with
//! anti-click crossfades, vocal overlay, and a 5-second transition into
//! track B's verse.
//!
//! Grounded on `examples/original_source/loop_mix.py`'s `_loop_to_duration`,
//! `_build_loop_transition`, and `build_loop_mix`.

use crate::stems::StemSet;
use crate::types::{AudioBuffer, Sample, StereoSample};

const CROSSFADE_SAMP: usize = 512;

/// Anchors needed by the loop builder, all in samples on the unified grid.
#[derive(Debug, Clone, Copy)]
pub struct LoopAnchors {
    pub s1_v1_start: usize,
    pub s1_c1_start: usize,
    pub s1_c1_end: usize,
    pub s2_c1_start: usize,
    pub s2_c1_end: usize,
    /// First verse in track B with start > `s2_c1_end`, already divided by
    /// `stretch_rate`.
    pub s2_verse_after_chorus_start: usize,
    pub s2_v2_end: usize,
}

/// Tiles `seg` to `target_samp`, snapped down to an integer number of bars
/// first to guarantee a clean loop point, with a 512-sample linear
/// crossfade at every internal tile boundary (spec.md §4.5 step 1).
fn loop_to_duration(seg: &[StereoSample], bar_samp: usize, target_samp: usize) -> Vec<StereoSample> {
    if seg.is_empty() || target_samp == 0 {
        return vec![StereoSample::silence(); target_samp];
    }
    let bars = (seg.len() / bar_samp).max(1);
    let seg_len = (bars * bar_samp).min(seg.len());
    let seg = &seg[..seg_len];
    let xf = CROSSFADE_SAMP.min(seg_len);

    let n_reps = target_samp.div_ceil(seg_len) + 1;
    let mut out = Vec::with_capacity(n_reps * seg_len);
    for _ in 0..n_reps {
        out.extend_from_slice(seg);
    }

    let ramp_out = crate::mix::fade_out(xf);
    let ramp_in = crate::mix::fade_in(xf);
    for k in 1..n_reps {
        let idx = k * seg_len;
        if idx >= xf && idx + xf <= out.len() {
            for i in 0..xf {
                out[idx - xf + i] = out[idx - xf + i] * ramp_out[i];
                out[idx + i] = out[idx + i] * ramp_in[i];
            }
        }
    }

    out.truncate(target_samp);
    if out.len() < target_samp {
        out.resize(target_samp, StereoSample::silence());
    }
    out
}

/// Zero-pads or truncates `stem[start..]` to exactly `len` samples (spec.md
/// §4.5 step 4: "If track B's verse has fewer than `trans_fade` samples
/// available, zero-pad").
fn slice_zero_padded(buf: &AudioBuffer, start: usize, len: usize) -> Vec<StereoSample> {
    let available = buf.slice(start, buf.len().max(start));
    let mut out = available.to_vec();
    out.truncate(len);
    if out.len() < len {
        out.resize(len, StereoSample::silence());
    }
    out
}

pub struct LoopResult {
    pub audio: AudioBuffer,
}

/// Builds the loop mix end to end (spec.md §4.5 steps 1-5).
///
/// `track_a_raw` is track A's original decoded audio (spec.md §4.5 Step 5.1:
/// "the original track A audio, not stems") — everything else is built from
/// the separated stems.
#[allow(clippy::too_many_arguments)]
pub fn build(
    stems_a: &StemSet,
    stems_b: &StemSet,
    track_a_raw: &AudioBuffer,
    anchors: LoopAnchors,
    bar_samp: usize,
    target_sr: u32,
) -> LoopResult {
    let trans_fade = 5 * target_sr as usize;
    let d2_chorus = anchors.s2_c1_end - anchors.s2_c1_start;
    let total_loop = d2_chorus + trans_fade;

    // Step 1: three independently-tiled instrumental bands (no vocals).
    let bass_seg = stems_a.bass.slice(anchors.s1_c1_start, anchors.s1_c1_end);
    let drums_seg = stems_a.drums.slice(anchors.s1_c1_start, anchors.s1_c1_end);
    let other_seg = stems_a.other.slice(anchors.s1_c1_start, anchors.s1_c1_end);

    let loop_low = loop_to_duration(bass_seg, bar_samp, total_loop);
    let loop_mid = loop_to_duration(other_seg, bar_samp, total_loop);
    let loop_high = loop_to_duration(drums_seg, bar_samp, total_loop);

    // Step 2: vocal overlay, zero beyond d2_chorus.
    let vocal_seg = stems_b.vocals.slice(anchors.s2_c1_start, anchors.s2_c1_end);
    let mut vocal_overlay = vec![StereoSample::silence(); total_loop];
    let overlay_len = vocal_seg.len().min(total_loop);
    vocal_overlay[..overlay_len].copy_from_slice(&vocal_seg[..overlay_len]);

    // Step 3: composite = loop instrumental + vocal overlay.
    let mut composite = AudioBuffer::from_stereo_samples(loop_low.clone(), target_sr);
    composite.add_assign_slice(&loop_mid);
    composite.add_assign_slice(&loop_high);
    composite.add_assign_slice(&vocal_overlay);

    // Step 4: transition. Track B enters at unity; track A's loop fades to
    // silence over trans_fade samples.
    let fade_out_ramp = crate::mix::fade_out(trans_fade);
    let s2v = anchors.s2_verse_after_chorus_start;

    let mut trans = AudioBuffer::silence(trans_fade, target_sr);
    trans.add_assign_scaled(&loop_low[d2_chorus..d2_chorus + trans_fade], &fade_out_ramp);
    trans.add_assign_scaled(&loop_mid[d2_chorus..d2_chorus + trans_fade], &fade_out_ramp);
    trans.add_assign_scaled(&loop_high[d2_chorus..d2_chorus + trans_fade], &fade_out_ramp);

    let unity: Vec<Sample> = vec![1.0; trans_fade];
    trans.add_assign_scaled(&slice_zero_padded(&stems_b.vocals, s2v, trans_fade), &unity);
    trans.add_assign_scaled(&slice_zero_padded(&stems_b.bass, s2v, trans_fade), &unity);
    trans.add_assign_scaled(&slice_zero_padded(&stems_b.other, s2v, trans_fade), &unity);
    trans.add_assign_scaled(&slice_zero_padded(&stems_b.drums, s2v, trans_fade), &unity);

    // Step 5: assembly. The prefix is the original track A audio, not stems.
    let mut out = AudioBuffer::from_stereo_samples(
        track_a_raw.slice(anchors.s1_v1_start, anchors.s1_c1_end).to_vec(),
        target_sr,
    );
    out.append(composite.slice(0, d2_chorus));
    out.append(trans.as_slice());

    let tail_start = s2v + trans_fade;
    if tail_start < anchors.s2_v2_end {
        let full_b = stems_b.full_mix();
        out.append(full_b.slice(tail_start, anchors.s2_v2_end));
    }

    LoopResult { audio: out }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    fn stems_with_segment(value: f32, len: usize, sr: u32) -> StemSet {
        let buf = || AudioBuffer::from_stereo_samples(vec![StereoSample::new(value, value); len], sr);
        StemSet {
            bass: buf(),
            drums: buf(),
            vocals: buf(),
            other: buf(),
        }
    }

    #[test]
    fn loop_to_duration_produces_exact_length() {
        let seg = vec![StereoSample::new(0.5, 0.5); 2000];
        let out = loop_to_duration(&seg, 500, 10_000);
        assert_eq!(out.len(), 10_000);
    }

    #[test]
    fn loop_to_duration_bounds_boundary_discontinuity() {
        let bar_samp = 1000;
        let mut seg = vec![StereoSample::new(0.0, 0.0); bar_samp];
        // Make the segment non-trivial so the crossfade has something to blend.
        for (i, s) in seg.iter_mut().enumerate() {
            *s = StereoSample::new((i as f32 / bar_samp as f32).sin(), 0.0);
        }
        let target = bar_samp * 5;
        let out = loop_to_duration(&seg, bar_samp, target);

        let max_abs = out.iter().map(|s| s.peak()).fold(0.0, f32::max);
        for k in 1..4 {
            let idx = k * bar_samp;
            let discontinuity = (out[idx].left - out[idx - 1].left).abs();
            assert!(discontinuity <= 2.0 * max_abs * (1.0 / 512.0) + 1e-6);
        }
    }

    #[test]
    fn build_assembles_expected_total_length() {
        let sr = 44_100;
        let bar_samp = 500;
        let stems_a = stems_with_segment(0.1, 20_000, sr);
        let stems_b = stems_with_segment(0.2, 20_000, sr);
        let track_a_raw = AudioBuffer::from_stereo_samples(vec![StereoSample::new(0.1, 0.1); 20_000], sr);

        let anchors = LoopAnchors {
            s1_v1_start: 0,
            s1_c1_start: 5_000,
            s1_c1_end: 8_000,
            s2_c1_start: 1_000,
            s2_c1_end: 3_000,
            s2_verse_after_chorus_start: 3_500,
            s2_v2_end: 19_000,
        };
        let result = build(&stems_a, &stems_b, &track_a_raw, anchors, bar_samp, sr);

        let d2_chorus = anchors.s2_c1_end - anchors.s2_c1_start;
        let trans_fade = 5 * sr as usize;
        let tail_start = anchors.s2_verse_after_chorus_start + trans_fade;
        let tail_len = anchors.s2_v2_end.saturating_sub(tail_start);
        let expected = (anchors.s1_c1_end - anchors.s1_v1_start) + d2_chorus + trans_fade + tail_len;
        assert_eq!(result.audio.len(), expected);
    }
}
