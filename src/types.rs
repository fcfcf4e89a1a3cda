//! Core audio buffer type shared across the mix engine.
//!
//! Owned interleaved stereo storage with zero-copy slicing by sample range,
//! plus the per-channel helpers the tempo/resample and band-summing stages
//! need.

use bytemuck::{Pod, Zeroable};

pub type Sample = f32;

/// Sample rate shared by a mix once both tracks have been aligned onto one grid.
pub type SampleRate = u32;

/// A single stereo frame (left, right).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.left + rhs.left, self.right + rhs.right)
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Sample) -> Self {
        Self::new(self.left * rhs, self.right * rhs)
    }
}

/// Owned stereo audio, channels always 2 after `ensure_stereo`.
///
/// Backed by a flat `Vec<StereoSample>` rather than per-channel `Vec<f32>`s so
/// that whole-buffer operations (slicing, summing bands, peak scan) stay
/// cache-friendly and so the interleaved view needed by `hound`/stretch
/// libraries is a zero-copy `bytemuck` cast.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Vec<StereoSample>,
    pub sample_rate: SampleRate,
}

impl AudioBuffer {
    pub fn silence(len: usize, sample_rate: SampleRate) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
            sample_rate,
        }
    }

    pub fn from_stereo_samples(samples: Vec<StereoSample>, sample_rate: SampleRate) -> Self {
        Self { samples, sample_rate }
    }

    /// Build stereo audio from separate left/right channels (mono input is
    /// promoted to stereo by the caller passing the same slice twice).
    pub fn from_channels(left: &[Sample], right: &[Sample], sample_rate: SampleRate) -> Self {
        assert_eq!(left.len(), right.len(), "channel length mismatch");
        let samples = left
            .iter()
            .zip(right.iter())
            .map(|(&l, &r)| StereoSample::new(l, r))
            .collect();
        Self { samples, sample_rate }
    }

    /// Promote a mono channel to stereo by duplication (spec.md §3: "Mono
    /// inputs are promoted to stereo by channel duplication").
    pub fn from_mono(mono: &[Sample], sample_rate: SampleRate) -> Self {
        Self::from_channels(mono, mono, sample_rate)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[StereoSample] {
        &self.samples
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.samples
    }

    /// Zero-copy view as interleaved `[L, R, L, R, ...]`, for stretch/resample
    /// libraries and WAV writers that want interleaved f32.
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.samples)
    }

    #[inline]
    pub fn as_interleaved_mut(&mut self) -> &mut [Sample] {
        bytemuck::cast_slice_mut(&mut self.samples)
    }

    pub fn left_channel(&self) -> Vec<Sample> {
        self.samples.iter().map(|s| s.left).collect()
    }

    pub fn right_channel(&self) -> Vec<Sample> {
        self.samples.iter().map(|s| s.right).collect()
    }

    /// Mono projection (average of L/R), used by the vocal-fit scorer.
    pub fn to_mono(&self) -> Vec<Sample> {
        self.samples.iter().map(|s| (s.left + s.right) * 0.5).collect()
    }

    /// A read-only view over `[start, end)`, clamped to the buffer's length.
    pub fn slice(&self, start: usize, end: usize) -> &[StereoSample] {
        let end = end.min(self.samples.len());
        let start = start.min(end);
        &self.samples[start..end]
    }

    /// Sum `self += other`, sample-for-sample, extending `self` if needed.
    /// Used to build composite bands (invariant 4: bands are summed, never
    /// individually normalized).
    pub fn add_assign_slice(&mut self, other: &[StereoSample]) {
        if self.samples.len() < other.len() {
            self.samples.resize(other.len(), StereoSample::silence());
        }
        for (dst, src) in self.samples.iter_mut().zip(other.iter()) {
            *dst += *src;
        }
    }

    pub fn append(&mut self, other: &[StereoSample]) {
        self.samples.extend_from_slice(other);
    }

    /// Adds `other * gain[i]` into `self` at each position (extends if
    /// needed). Used for the linear-ramp fades in transition builders: the
    /// gain curve is computed once per phase and applied to whichever band
    /// is fading in or out.
    pub fn add_assign_scaled(&mut self, other: &[StereoSample], gain: &[Sample]) {
        debug_assert_eq!(other.len(), gain.len());
        if self.samples.len() < other.len() {
            self.samples.resize(other.len(), StereoSample::silence());
        }
        for ((dst, src), &g) in self.samples.iter_mut().zip(other.iter()).zip(gain.iter()) {
            *dst += *src * g;
        }
    }

    pub fn peak(&self) -> Sample {
        self.samples.iter().map(|s| s.peak()).fold(0.0, Sample::max)
    }

    /// Peak-normalize to `target` (spec.md invariant 5 / §4.7: a no-op when
    /// the buffer is silent, never upward-scaled past `target`).
    pub fn normalize_peak(&mut self, target: Sample) {
        let peak = self.peak();
        if peak == 0.0 {
            return;
        }
        let gain = target / peak;
        for s in &mut self.samples {
            *s = *s * gain;
        }
    }
}

/// Sum a list of stereo slices, sample-for-sample. All inputs must share the
/// same length; used to build `low+mid+high` and similar band sums without
/// normalizing any individual stem first.
pub fn sum_bands(bands: &[&[StereoSample]], sample_rate: SampleRate) -> AudioBuffer {
    let len = bands.iter().map(|b| b.len()).max().unwrap_or(0);
    let mut out = vec![StereoSample::silence(); len];
    for band in bands {
        for (dst, src) in out.iter_mut().zip(band.iter()) {
            *dst += *src;
        }
    }
    AudioBuffer::from_stereo_samples(out, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_promotion_duplicates_channel() {
        let buf = AudioBuffer::from_mono(&[0.1, 0.2, 0.3], 44_100);
        assert_eq!(buf.as_slice()[1], StereoSample::new(0.2, 0.2));
    }

    #[test]
    fn normalize_peak_is_noop_on_silence() {
        let mut buf = AudioBuffer::silence(100, 44_100);
        buf.normalize_peak(0.9);
        assert_eq!(buf.peak(), 0.0);
    }

    #[test]
    fn normalize_peak_scales_to_target() {
        let mut buf = AudioBuffer::from_channels(&[0.5, -1.0, 0.25], &[0.5, -1.0, 0.25], 44_100);
        buf.normalize_peak(0.9);
        assert!((buf.peak() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn sum_bands_adds_without_normalizing_individually() {
        let a = [StereoSample::new(0.5, 0.5)];
        let b = [StereoSample::new(0.5, 0.5)];
        let summed = sum_bands(&[&a, &b], 44_100);
        assert_eq!(summed.as_slice()[0], StereoSample::new(1.0, 1.0));
    }
}
