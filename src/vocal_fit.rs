//! Vocal-fit scorer (informational, spec.md §4.6).
//!
//! Runs before loop assembly on mono projections of track A's chorus
//! instrumental, track A's chorus vocals, and track B's stretched chorus
//! vocals. Grounded on `examples/original_source/loop_mix.py`'s
//! `score_vocal_fit`/`_beat_emphasis_template`/`_pitch_contour`/`_safe_corr`.
//! Onset strength and pitch tracking are specified as trait contracts
//! (`OnsetEnvelope`, `PitchTrack`) rather than bound to a specific DSP
//! library, per spec.md §9 — the shapes mirror `librosa.onset.onset_strength`
//! and `librosa.pyin` without depending on librosa.

const HOP: usize = 512;
const SIGMA_0: f64 = 0.050;
const MU_0: f64 = 0.030;

/// Per-frame onset strength, one value per STFT hop.
pub trait OnsetEnvelope {
    fn onset_strength(&self, mono: &[f32], sample_rate: u32) -> Vec<f64>;
    fn onset_times(&self, mono: &[f32], sample_rate: u32) -> Vec<f64>;
}

/// Per-frame fundamental frequency (semitones relative to A4) with a voiced flag.
pub trait PitchTrack {
    fn pitch_contour(&self, mono: &[f32], sample_rate: u32) -> Vec<Option<f64>>;
}

/// A straightforward spectral-flux onset detector over an STFT magnitude
/// spectrum, matching the *shape* of `librosa.onset.onset_strength` (rectified
/// frame-to-frame magnitude increase, summed across bins) without depending
/// on librosa.
pub struct SpectralFluxOnset;

impl OnsetEnvelope for SpectralFluxOnset {
    fn onset_strength(&self, mono: &[f32], _sample_rate: u32) -> Vec<f64> {
        let frames = stft_magnitudes(mono);
        let mut strength = Vec::with_capacity(frames.len());
        let mut prev: Option<&Vec<f64>> = None;
        for frame in &frames {
            let flux = match prev {
                Some(p) => frame
                    .iter()
                    .zip(p.iter())
                    .map(|(&m, &pm)| (m - pm).max(0.0))
                    .sum(),
                None => 0.0,
            };
            strength.push(flux);
            prev = Some(frame);
        }
        strength
    }

    fn onset_times(&self, mono: &[f32], sample_rate: u32) -> Vec<f64> {
        let strength = self.onset_strength(mono, sample_rate);
        let mean = strength.iter().sum::<f64>() / strength.len().max(1) as f64;
        let mut times = Vec::new();
        for i in 1..strength.len().saturating_sub(1) {
            if strength[i] > mean && strength[i] >= strength[i - 1] && strength[i] >= strength[i + 1] {
                times.push((i * HOP) as f64 / sample_rate as f64);
            }
        }
        times
    }
}

/// Autocorrelation-based per-frame F0, matching the *shape* of a probabilistic
/// pitch tracker (`librosa.pyin`) without depending on it: each hop is
/// windowed, autocorrelated, and the lag of the highest peak in the voiced
/// range becomes F0; low-energy frames are unvoiced.
pub struct AutocorrelationPitch;

impl PitchTrack for AutocorrelationPitch {
    fn pitch_contour(&self, mono: &[f32], sample_rate: u32) -> Vec<Option<f64>> {
        let frame_len = HOP * 4;
        let min_freq = 80.0;
        let max_freq = 1000.0;
        let min_lag = (sample_rate as f64 / max_freq) as usize;
        let max_lag = (sample_rate as f64 / min_freq) as usize;

        let mut out = Vec::new();
        let mut pos = 0;
        while pos + frame_len <= mono.len() {
            let frame = &mono[pos..pos + frame_len];
            let energy: f64 = frame.iter().map(|&s| (s as f64).powi(2)).sum();
            if energy < 1e-6 {
                out.push(None);
            } else {
                out.push(best_lag(frame, min_lag, max_lag.min(frame.len() / 2)).map(|lag| {
                    let freq = sample_rate as f64 / lag as f64;
                    12.0 * (freq / 440.0).log2()
                }));
            }
            pos += HOP;
        }
        out
    }
}

fn best_lag(frame: &[f32], min_lag: usize, max_lag: usize) -> Option<usize> {
    if min_lag >= max_lag || max_lag >= frame.len() {
        return None;
    }
    let mut best = (0usize, f64::MIN);
    for lag in min_lag..max_lag {
        let corr: f64 = frame[..frame.len() - lag]
            .iter()
            .zip(frame[lag..].iter())
            .map(|(&a, &b)| (a as f64) * (b as f64))
            .sum();
        if corr > best.1 {
            best = (lag, corr);
        }
    }
    if best.1 <= 0.0 {
        None
    } else {
        Some(best.0)
    }
}

fn stft_magnitudes(mono: &[f32]) -> Vec<Vec<f64>> {
    let frame_len = HOP * 2;
    let window: Vec<f64> = (0..frame_len)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / (frame_len - 1) as f64).cos())
        .collect();

    let mut frames = Vec::new();
    let mut pos = 0;
    while pos + frame_len <= mono.len() {
        let windowed: Vec<f64> = mono[pos..pos + frame_len]
            .iter()
            .zip(window.iter())
            .map(|(&s, &w)| s as f64 * w)
            .collect();
        frames.push(dft_magnitude(&windowed));
        pos += HOP;
    }
    frames
}

fn dft_magnitude(frame: &[f64]) -> Vec<f64> {
    let n = frame.len();
    let bins = n / 2;
    let mut mags = Vec::with_capacity(bins);
    for k in 0..bins {
        let mut re = 0.0;
        let mut im = 0.0;
        for (t, &x) in frame.iter().enumerate() {
            let angle = -2.0 * std::f64::consts::PI * k as f64 * t as f64 / n as f64;
            re += x * angle.cos();
            im += x * angle.sin();
        }
        mags.push((re * re + im * im).sqrt());
    }
    mags
}

fn normalize(values: &[f64]) -> Vec<f64> {
    let max = values.iter().cloned().fold(0.0, f64::max);
    if max <= 0.0 {
        return values.to_vec();
    }
    values.iter().map(|&v| v / max).collect()
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let a = &a[..n];
    let b = &b[..n];
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Safe Pearson correlation, clamped to `[0, 1]` (`max(0, corr)`), matching
/// the original's `_safe_corr`.
fn safe_corr(a: &[f64], b: &[f64]) -> f64 {
    pearson(a, b).max(0.0)
}

/// Builds the per-bar emphasis template from an instrumental onset-strength
/// envelope: average onset energy across all same-position frames within
/// each bar, normalize, tile to signal length.
fn beat_emphasis_template(onset_strength: &[f64], bpm: f64, sample_rate: u32, signal_len: usize) -> Vec<f64> {
    let frames_per_bar = (4.0 * (60.0 / bpm * sample_rate as f64 / HOP as f64).round()) as usize;
    let frames_per_bar = frames_per_bar.max(1);

    let mut template = vec![0.0; frames_per_bar];
    let mut counts = vec![0usize; frames_per_bar];
    for (i, &v) in onset_strength.iter().enumerate() {
        let pos = i % frames_per_bar;
        template[pos] += v;
        counts[pos] += 1;
    }
    for i in 0..frames_per_bar {
        if counts[i] > 0 {
            template[i] /= counts[i] as f64;
        }
    }
    let template = normalize(&template);

    let n_frames = signal_len.div_ceil(HOP).max(1);
    (0..n_frames).map(|i| template[i % frames_per_bar]).collect()
}

/// Final weighted score (spec.md §4.6: 0.40 accent + 0.25 timing + 0.15
/// contour + 0.20 vocal-reference).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VocalFitScore {
    pub accent_alignment: f64,
    pub microtiming: f64,
    pub pitch_movement: f64,
    pub vocal_reference: f64,
    pub final_score: f64,
}

pub struct ScoreInput<'a> {
    pub a_instrumental: &'a [f32],
    pub a_vocals: &'a [f32],
    pub b_vocals: &'a [f32],
    pub sample_rate: u32,
    pub bpm: f64,
}

pub fn score(
    input: ScoreInput,
    onset: &impl OnsetEnvelope,
    pitch: &impl PitchTrack,
) -> VocalFitScore {
    let a_instrumental_onset = normalize(&onset.onset_strength(input.a_instrumental, input.sample_rate));
    let v1_onset = normalize(&onset.onset_strength(input.a_vocals, input.sample_rate));
    let v2_onset = normalize(&onset.onset_strength(input.b_vocals, input.sample_rate));

    let emphasis = beat_emphasis_template(&a_instrumental_onset, input.bpm, input.sample_rate, input.b_vocals.len());
    let accent_alignment = safe_corr(&v2_onset, &emphasis);

    let microtiming = score_microtiming(input.b_vocals, input.sample_rate, input.bpm, onset);

    let pitch_movement = score_pitch_movement(input.b_vocals, input.sample_rate, pitch, &emphasis);

    let vocal_reference = safe_corr(&v1_onset, &v2_onset);

    let final_score =
        0.40 * accent_alignment + 0.25 * microtiming + 0.15 * pitch_movement + 0.20 * vocal_reference;

    VocalFitScore {
        accent_alignment,
        microtiming,
        pitch_movement,
        vocal_reference,
        final_score,
    }
}

fn score_microtiming(b_vocals: &[f32], sample_rate: u32, bpm: f64, onset: &impl OnsetEnvelope) -> f64 {
    let onsets = onset.onset_times(b_vocals, sample_rate);
    if onsets.len() < 2 {
        return 0.0;
    }
    let subdiv = (60.0 / bpm) / 2.0;
    let offsets: Vec<f64> = onsets
        .iter()
        .map(|&t| {
            let nearest = (t / subdiv).round() * subdiv;
            let mut offset = t - nearest;
            let half = subdiv / 2.0;
            while offset > half {
                offset -= subdiv;
            }
            while offset < -half {
                offset += subdiv;
            }
            offset
        })
        .collect();

    let mean = offsets.iter().sum::<f64>() / offsets.len() as f64;
    let variance = offsets.iter().map(|&o| (o - mean).powi(2)).sum::<f64>() / offsets.len() as f64;
    let sigma = variance.sqrt();

    (-sigma * sigma / (SIGMA_0 * SIGMA_0)).exp() * (-mean * mean / (MU_0 * MU_0)).exp()
}

fn score_pitch_movement(b_vocals: &[f32], sample_rate: u32, pitch: &impl PitchTrack, emphasis: &[f64]) -> f64 {
    let contour = pitch.pitch_contour(b_vocals, sample_rate);
    let filled = interpolate_short_gaps(&contour, 4);

    let mut d_f0 = Vec::with_capacity(filled.len());
    let mut prev: Option<f64> = None;
    for v in &filled {
        match (prev, v) {
            (Some(p), Some(c)) => d_f0.push((c - p).abs()),
            _ => d_f0.push(0.0),
        }
        prev = *v;
    }
    let d_f0 = normalize(&d_f0);
    safe_corr(&d_f0, emphasis)
}

/// Linearly interpolates unvoiced gaps of length `<= max_gap` frames; longer
/// gaps stay unvoiced (`None` → contributes 0 to `d_f0`).
fn interpolate_short_gaps(contour: &[Option<f64>], max_gap: usize) -> Vec<Option<f64>> {
    let mut out = contour.to_vec();
    let mut i = 0;
    while i < out.len() {
        if out[i].is_none() {
            let start = i;
            while i < out.len() && out[i].is_none() {
                i += 1;
            }
            let gap_len = i - start;
            if gap_len <= max_gap && start > 0 && i < out.len() {
                let before = out[start - 1].unwrap();
                let after = out[i].unwrap();
                for (j, slot) in out[start..i].iter_mut().enumerate() {
                    let t = (j + 1) as f64 / (gap_len + 1) as f64;
                    *slot = Some(before + (after - before) * t);
                }
            }
        } else {
            i += 1;
        }
    }
    out
}
