//! Tempo/resample pipeline: stretch the slower track to the faster tempo,
//! resample to a common sample rate.
//!
//! Stretching is grounded on `mesh-core::timestretch::TimeStretcher`, which
//! wraps `signalsmith-stretch`'s real-time block API; here it is generalized
//! to offline whole-buffer processing by feeding the buffer through in
//! fixed-size blocks and flushing the tail, matching the one-shot semantics
//! of a whole-track stretch. Resampling is `rubato`'s `SincFixedIn`, applied
//! per channel.

use rayon::prelude::*;
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use signalsmith_stretch::Stretch;

use crate::stems::StemSet;
use crate::types::{AudioBuffer, Sample};

const BLOCK_SIZE: usize = 4096;

/// `target_bpm = max(bpm_a, bpm_b)`, `stretch_rate = target_bpm / min(bpm_a, bpm_b)`,
/// applied only to the slower track (spec.md §3). Always `>= 1.0`: the
/// faster track is the reference, the slower one is sped up, never slowed.
pub fn stretch_rate(bpm_a: f64, bpm_b: f64) -> f64 {
    let target_bpm = bpm_a.max(bpm_b);
    let slower_bpm = bpm_a.min(bpm_b);
    target_bpm / slower_bpm
}

/// Time-stretches one channel by `rate` using a phase-vocoder-class
/// algorithm, preserving pitch. `rate == 1.0` is a pass-through (spec.md
/// §4.3). `rate > 1.0` means the output is shorter (played back faster).
pub fn stretch_channel(input: &[Sample], sample_rate: u32, rate: f64) -> Vec<Sample> {
    if (rate - 1.0).abs() < f64::EPSILON {
        return input.to_vec();
    }

    let mut stretch = Stretch::preset_default(1, sample_rate);
    let mut output = Vec::with_capacity((input.len() as f64 / rate) as usize + BLOCK_SIZE);

    let mut pos = 0;
    while pos < input.len() {
        let block_in_len = (BLOCK_SIZE as f64 * rate).round() as usize;
        let end = (pos + block_in_len).min(input.len());
        let block = &input[pos..end];
        let out_len = (block.len() as f64 / rate).round() as usize;
        let mut out_block = vec![0.0f32; out_len.max(1)];
        stretch.process(block, &mut out_block);
        output.extend_from_slice(&out_block);
        pos = end;
    }

    output
}

/// Stretches every stem of a track by `rate`, per channel (spec.md §4.3:
/// "Stretching is applied per channel on each stem that belongs to the
/// slower track"). The four stems are independent, so they're stretched in
/// parallel.
pub fn stretch_stems(stems: StemSet, rate: f64) -> StemSet {
    let StemSet { bass, drums, vocals, other } = stems;
    let mut bufs = [bass, drums, vocals, other];
    bufs.par_iter_mut().for_each(|buf| {
        let sr = buf.sample_rate;
        let left = stretch_channel(&buf.left_channel(), sr, rate);
        let right = stretch_channel(&buf.right_channel(), sr, rate);
        *buf = AudioBuffer::from_channels(&left, &right, sr);
    });
    let [bass, drums, vocals, other] = bufs;
    StemSet { bass, drums, vocals, other }
}

/// Resamples one channel from `from_sr` to `to_sr` with a band-limited sinc
/// resampler, preserving duration-in-seconds.
pub fn resample_channel(input: &[Sample], from_sr: u32, to_sr: u32) -> Vec<Sample> {
    if from_sr == to_sr || input.is_empty() {
        return input.to_vec();
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = to_sr as f64 / from_sr as f64;
    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 2.0, params, input.len(), 1).expect("valid resampler params");

    let waves_in = vec![input.to_vec()];
    let mut waves_out = resampler
        .process(&waves_in, None)
        .expect("resample with matching channel count");
    waves_out.remove(0)
}

/// Resamples a single full-mix buffer (not a stem set) to `to_sr` — used for
/// track A's raw decoded audio, which is read once and shares this module's
/// resampler rather than going through `resample_stems`.
pub fn resample_buffer(buf: AudioBuffer, to_sr: u32) -> AudioBuffer {
    if buf.sample_rate == to_sr {
        return buf;
    }
    let from_sr = buf.sample_rate;
    let left = resample_channel(&buf.left_channel(), from_sr, to_sr);
    let right = resample_channel(&buf.right_channel(), from_sr, to_sr);
    AudioBuffer::from_channels(&left, &right, to_sr)
}

/// Resamples every stem of a track from its current sample rate to `to_sr`,
/// one stem per rayon task.
pub fn resample_stems(stems: StemSet, to_sr: u32) -> StemSet {
    let StemSet { bass, drums, vocals, other } = stems;
    let mut bufs = [bass, drums, vocals, other];
    bufs.par_iter_mut().for_each(|buf| {
        let from_sr = buf.sample_rate;
        let left = resample_channel(&buf.left_channel(), from_sr, to_sr);
        let right = resample_channel(&buf.right_channel(), from_sr, to_sr);
        *buf = AudioBuffer::from_channels(&left, &right, to_sr);
    });
    let [bass, drums, vocals, other] = bufs;
    StemSet { bass, drums, vocals, other }
}
