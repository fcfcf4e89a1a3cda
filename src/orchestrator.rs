//! End-to-end mix orchestration (spec.md §4.7).
//!
//! Sequence: fetch analyses → decide strategy → fetch stems → stretch+resample
//! → convert timestamps to the unified grid → validate prerequisites →
//! dispatch to the chosen builder → peak-normalize → write output WAV →
//! rename to the canonical filename.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::analysis::{Analyzer, Section};
use crate::camelot::Camelot;
use crate::io::wav;
use crate::mix::{self, loop_builder, loose, tight, MixConfig, Strategy, TrackBands};
use crate::stems::{StemSet, StemStore};
use crate::tempo;
use crate::vocal_fit::{self, AutocorrelationPitch, ScoreInput, SpectralFluxOnset};
use crate::error::MixError;

/// Options the CLI/caller can set beyond the two required input paths.
#[derive(Debug, Clone)]
pub struct MixOptions {
    pub output_dir: PathBuf,
    /// Off by default (spec.md §4.7 supplemental feature): writes the source
    /// reference cuts the assembly pulled from, alongside the mix.
    pub keep_reference_cuts: bool,
}

impl Default for MixOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            keep_reference_cuts: false,
        }
    }
}

/// Runs a full mix and returns the path to the written WAV.
pub fn mix(
    song1_path: &Path,
    song2_path: &Path,
    analyzer: &impl Analyzer,
    stem_store: &impl StemStore,
    options: &MixOptions,
) -> Result<PathBuf, MixError> {
    for p in [song1_path, song2_path] {
        if !p.is_file() {
            return Err(MixError::FileNotFound(p.to_path_buf()));
        }
    }

    info!("analyzing {}", song1_path.display());
    let analysis1 = analyzer.analyze(song1_path)?;
    info!("analyzing {}", song2_path.display());
    let analysis2 = analyzer.analyze(song2_path)?;

    // Track A is whichever input has the higher BPM — the reference that is
    // never stretched (testable property 7). Ties favor song1, matching
    // `many_transitions.py`'s `if bpm2 < bpm1: stretch(song2)`.
    let (a_path, a_analysis, b_path, b_analysis) = if analysis1.bpm >= analysis2.bpm {
        (song1_path, analysis1.clone(), song2_path, analysis2.clone())
    } else {
        (song2_path, analysis2.clone(), song1_path, analysis1.clone())
    };

    let camelot_a: Camelot = a_analysis.camelot.try_into()?;
    let camelot_b: Camelot = b_analysis.camelot.try_into()?;
    let key_ok = mix::key_ok(camelot_a, camelot_b);
    let bpm_diff = mix::bpm_diff(a_analysis.bpm, b_analysis.bpm);
    let strategy = mix::select_strategy(bpm_diff, key_ok);
    info!(
        "bpm_a={:.2} bpm_b={:.2} key_ok={key_ok} bpm_diff={bpm_diff:.2} -> strategy={:?}",
        a_analysis.bpm, b_analysis.bpm, strategy
    );

    info!("fetching stems for {}", a_path.display());
    let stems_a_raw = stem_store.get(a_path)?;
    info!("fetching stems for {}", b_path.display());
    let stems_b_raw = stem_store.get(b_path)?;

    // Track A's original audio (spec.md §4.4/§4.5: transition prefixes are
    // cut from this, not from the demucs stems, which don't reconstruct the
    // input bit-exactly).
    info!("decoding original audio for {}", a_path.display());
    let track_a_decoded = crate::io::read_track(a_path)?;

    let (config, _) = MixConfig::derive(
        a_analysis.bpm,
        stems_a_raw.sample_rate(),
        b_analysis.bpm,
        stems_b_raw.sample_rate(),
    );

    // Track A is never stretched; track B is stretched and, if needed,
    // resampled to track A's sample rate (spec.md §4.3).
    let stems_a = stems_a_raw;
    let mut stems_b = tempo::stretch_stems(stems_b_raw, config.stretch_rate);
    if stems_b.sample_rate() != config.target_sr {
        stems_b = tempo::resample_stems(stems_b, config.target_sr);
    }
    let track_a_raw = if track_a_decoded.sample_rate != config.target_sr {
        tempo::resample_buffer(track_a_decoded, config.target_sr)
    } else {
        track_a_decoded
    };

    let grid = config.grid;
    let to_samp_a = |sec: f64| grid.sec_to_samp(sec);
    let to_samp_b = |sec: f64| grid.stretched_sec_to_samp(sec, config.stretch_rate);

    let a_chorus1 = first_section(&a_analysis.choruses)
        .ok_or_else(|| MixError::PrerequisiteError("track A has no chorus".into()))?;
    let b_chorus1 = first_section(&b_analysis.choruses)
        .ok_or_else(|| MixError::PrerequisiteError("track B has no chorus".into()))?;
    let a_verse1 = first_section(&a_analysis.verses)
        .ok_or_else(|| MixError::PrerequisiteError("track A has no verse".into()))?;

    let s1_v1_start = to_samp_a(a_verse1.start_sec);
    let s1_c1_start = to_samp_a(a_chorus1.start_sec);
    let s1_c1_end = to_samp_a(a_chorus1.end_sec);
    let s2_c1_start = to_samp_b(b_chorus1.start_sec);
    let s2_c1_end = to_samp_b(b_chorus1.end_sec);

    let b_verse2_end_sec = b_analysis
        .verses
        .get(1)
        .ok_or_else(|| MixError::PrerequisiteError("track B has no second verse".into()))?
        .end_sec;
    let s2_v2_end = to_samp_b(b_verse2_end_sec).min(stems_b.bass.len()).min(stems_b.drums.len());

    let bands_a = TrackBands::from_stems(&stems_a);
    let bands_b = TrackBands::from_stems(&stems_b);

    let (audio, anchor_sec, mode) = match strategy {
        Strategy::Loop => {
            let b_chorus1_end_sec = b_chorus1.end_sec;
            let s2_verse_after_chorus_start = b_analysis
                .verses
                .iter()
                .find(|v| v.start_sec > b_chorus1_end_sec)
                .map(|v| to_samp_b(v.start_sec))
                .ok_or_else(|| {
                    MixError::PrerequisiteError(
                        "track B has no verse after chorus 1 end".into(),
                    )
                })?;

            let anchors = loop_builder::LoopAnchors {
                s1_v1_start,
                s1_c1_start,
                s1_c1_end,
                s2_c1_start,
                s2_c1_end,
                s2_verse_after_chorus_start,
                s2_v2_end,
            };
            validate_window(&stems_a, &stems_b, s1_c1_end, s2_c1_end)?;

            info!("scoring vocal fit");
            log_vocal_fit(&stems_a, &stems_b, s1_c1_start, s1_c1_end, s2_c1_start, s2_c1_end, a_analysis.bpm);

            let result = loop_builder::build(&stems_a, &stems_b, &track_a_raw, anchors, grid.bar_samp(), config.target_sr);
            (result.audio, a_chorus1.end_sec, "loop")
        }
        Strategy::Tight => {
            let anchors = tight::TightAnchors {
                s1_v1_start,
                s1_c1_start,
                s1_c1_end,
                s2_c1_start,
                s2_v2_end,
            };
            validate_window(&stems_a, &stems_b, s1_c1_end, s2_c1_end)?;
            let result = tight::build(&bands_a, &bands_b, &track_a_raw, anchors, grid.phrase_samp());
            (result.audio, a_chorus1.start_sec, "tight")
        }
        Strategy::Loose => {
            let a_verse2 = a_analysis
                .verses
                .get(1)
                .ok_or_else(|| MixError::PrerequisiteError("track A has no second verse".into()))?;
            let verse_a2_start = to_samp_a(a_verse2.start_sec);

            let anchors = loose::LooseAnchors {
                s1_v1_start,
                verse_a2_start,
                s2_c1_start,
                s2_v2_end,
            };
            validate_window(&stems_a, &stems_b, s1_c1_end, s2_c1_end)?;
            let result = loose::build(&bands_a, &bands_b, &track_a_raw, anchors, grid);
            (result.audio, a_verse2.start_sec, "loose")
        }
    };

    let mut audio = audio;
    audio.normalize_peak(0.9);

    let mixes_dir = options.output_dir.join("mixes");
    fs::create_dir_all(&mixes_dir).map_err(MixError::IoError)?;

    let anchor_samp = to_samp_a(anchor_sec);
    let total_secs = anchor_samp as f64 / config.target_sr as f64;
    let minutes = (total_secs / 60.0) as u64;
    let seconds = (total_secs - (minutes * 60) as f64) as u64;

    let stem_a = file_stem(song1_path)?;
    let stem_b = file_stem(song2_path)?;
    let filename = format!("{stem_a}_{stem_b}_{mode}_t{minutes}m{seconds:02}s.wav");
    let final_path = mixes_dir.join(&filename);

    let temp_path = mixes_dir.join(format!(".{filename}.tmp"));
    wav::write(&temp_path, &audio)?;
    fs::rename(&temp_path, &final_path).map_err(MixError::IoError)?;
    info!("wrote {}", final_path.display());

    if options.keep_reference_cuts {
        write_reference_cuts(&options.output_dir, &track_a_raw, &stems_b, s1_v1_start, s1_c1_end, s2_c1_start, s2_c1_end)?;
    }

    Ok(final_path)
}

fn first_section(sections: &[Section]) -> Option<&Section> {
    sections.first()
}

fn file_stem(path: &Path) -> Result<String, MixError> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| MixError::FileNotFound(path.to_path_buf()))
}

fn validate_window(stems_a: &StemSet, stems_b: &StemSet, s1_c1_end: usize, s2_c1_end: usize) -> Result<(), MixError> {
    if s1_c1_end > stems_a.bass.len() {
        return Err(MixError::PrerequisiteError(
            "track A stems too short for the transition window".into(),
        ));
    }
    if s2_c1_end > stems_b.bass.len() {
        return Err(MixError::PrerequisiteError(
            "track B stems too short for the transition window".into(),
        ));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn log_vocal_fit(
    stems_a: &StemSet,
    stems_b: &StemSet,
    s1_c1_start: usize,
    s1_c1_end: usize,
    s2_c1_start: usize,
    s2_c1_end: usize,
    bpm: f64,
) {
    let mut instrumental = stems_a.bass.clone();
    instrumental.add_assign_slice(stems_a.drums.as_slice());
    instrumental.add_assign_slice(stems_a.other.as_slice());

    let a_instrumental = instrumental.slice(s1_c1_start, s1_c1_end).to_vec();
    let a_instrumental = crate::types::AudioBuffer::from_stereo_samples(a_instrumental, stems_a.sample_rate()).to_mono();
    let a_vocals = crate::types::AudioBuffer::from_stereo_samples(
        stems_a.vocals.slice(s1_c1_start, s1_c1_end).to_vec(),
        stems_a.sample_rate(),
    )
    .to_mono();
    let b_vocals = crate::types::AudioBuffer::from_stereo_samples(
        stems_b.vocals.slice(s2_c1_start, s2_c1_end).to_vec(),
        stems_b.sample_rate(),
    )
    .to_mono();

    let input = ScoreInput {
        a_instrumental: &a_instrumental,
        a_vocals: &a_vocals,
        b_vocals: &b_vocals,
        sample_rate: stems_a.sample_rate(),
        bpm,
    };
    let score = vocal_fit::score(input, &SpectralFluxOnset, &AutocorrelationPitch);
    info!(
        "vocal fit: accent={:.3} timing={:.3} contour={:.3} voc_ref={:.3} final={:.3}",
        score.accent_alignment, score.microtiming, score.pitch_movement, score.vocal_reference, score.final_score
    );
    println!(
        "Vocal fit — accent: {:.3}  timing: {:.3}  contour: {:.3}  voc_ref: {:.3}  final: {:.3}",
        score.accent_alignment, score.microtiming, score.pitch_movement, score.vocal_reference, score.final_score
    );
}

#[allow(clippy::too_many_arguments)]
fn write_reference_cuts(
    output_dir: &Path,
    track_a_raw: &crate::types::AudioBuffer,
    stems_b: &StemSet,
    s1_v1_start: usize,
    s1_c1_end: usize,
    s2_c1_start: usize,
    s2_c1_end: usize,
) -> Result<(), MixError> {
    let song1_dir = output_dir.join("song_1");
    let song2_dir = output_dir.join("song_2");
    fs::create_dir_all(&song1_dir).map_err(MixError::IoError)?;
    fs::create_dir_all(&song2_dir).map_err(MixError::IoError)?;

    // Cut from the original track A audio, not stems (many_transitions.py's
    // reference-cut saves use raw `y1`, never the stem sum).
    let a_cut = crate::types::AudioBuffer::from_stereo_samples(
        track_a_raw.slice(s1_v1_start, s1_c1_end).to_vec(),
        track_a_raw.sample_rate,
    );
    wav::write(&song1_dir.join("verse1_to_chorus1.wav"), &a_cut)?;

    let b_cut = crate::types::AudioBuffer::from_stereo_samples(
        stems_b.full_mix().slice(s2_c1_start, s2_c1_end).to_vec(),
        stems_b.sample_rate(),
    );
    wav::write(&song2_dir.join("chorus1.wav"), &b_cut)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{CamelotKey, TrackAnalysis};
    use crate::camelot::Ring;
    use crate::types::{AudioBuffer, StereoSample};

    struct FakeAnalyzer {
        entries: Vec<(PathBuf, TrackAnalysis)>,
    }

    impl FakeAnalyzer {
        fn entry(&self, path: &Path) -> &TrackAnalysis {
            self.entries
                .iter()
                .find(|(p, _)| p == path)
                .map(|(_, a)| a)
                .unwrap_or_else(|| panic!("no fake analysis for {}", path.display()))
        }
    }

    impl Analyzer for FakeAnalyzer {
        fn bpm(&self, path: &Path) -> Result<f64, MixError> {
            Ok(self.entry(path).bpm)
        }

        fn key(&self, path: &Path) -> Result<Camelot, MixError> {
            self.entry(path).camelot.try_into()
        }

        fn choruses(&self, path: &Path) -> Result<Vec<Section>, MixError> {
            Ok(self.entry(path).choruses.clone())
        }

        fn verses(&self, path: &Path) -> Result<Vec<Section>, MixError> {
            Ok(self.entry(path).verses.clone())
        }
    }

    struct FakeStemStore {
        entries: Vec<(PathBuf, StemSet)>,
    }

    impl StemStore for FakeStemStore {
        fn lookup(&self, track_stem: &str) -> Result<Option<StemSet>, MixError> {
            Ok(self
                .entries
                .iter()
                .find(|(p, _)| p.file_stem().and_then(|s| s.to_str()) == Some(track_stem))
                .map(|(_, s)| s.clone()))
        }

        fn populate(&self, track_path: &Path) -> Result<StemSet, MixError> {
            Err(MixError::PrerequisiteError(format!(
                "no fake stems registered for {}",
                track_path.display()
            )))
        }
    }

    /// Writes a decodable WAV with `len` flat stereo samples — `mix` now
    /// decodes track A's original audio via `io::read_track`, so the input
    /// path for whichever track ends up as track A must be real audio, not
    /// an empty placeholder.
    fn write_track(path: &Path, len: usize, sr: u32) {
        let buf = AudioBuffer::from_stereo_samples(vec![StereoSample::new(0.05, 0.05); len], sr);
        wav::write(path, &buf).unwrap();
    }

    fn flat_stem_set(value: f32, len: usize, sr: u32) -> StemSet {
        let buf = || AudioBuffer::from_stereo_samples(vec![StereoSample::new(value, value); len], sr);
        StemSet {
            bass: buf(),
            drums: buf(),
            vocals: buf(),
            other: buf(),
        }
    }

    fn camelot_key(number: u8, ring: Ring) -> CamelotKey {
        Camelot::new(number, ring).into()
    }

    /// Scenario S1 (spec.md §8): compatible keys, bpm_diff <= 10 -> loop.
    #[test]
    fn scenario_s1_end_to_end_loop() {
        let dir = tempfile::tempdir().unwrap();
        let song1 = dir.path().join("alpha.wav");
        let song2 = dir.path().join("beta.wav");
        let sr = 2_000u32;
        write_track(&song1, 75_000, sr);
        write_track(&song2, 85_000, sr);
        let a_analysis = TrackAnalysis {
            bpm: 128.0,
            camelot: camelot_key(8, Ring::Major),
            choruses: vec![Section::new(5.0, 35.0)],
            verses: vec![Section::new(0.0, 5.0)],
        };
        let b_analysis = TrackAnalysis {
            bpm: 128.0,
            camelot: camelot_key(8, Ring::Major),
            choruses: vec![Section::new(2.0, 10.0)],
            verses: vec![Section::new(0.0, 2.0), Section::new(11.0, 40.0)],
        };
        let analyzer = FakeAnalyzer {
            entries: vec![(song1.clone(), a_analysis), (song2.clone(), b_analysis)],
        };
        let stem_store = FakeStemStore {
            entries: vec![
                (song1.clone(), flat_stem_set(0.1, 75_000, sr)),
                (song2.clone(), flat_stem_set(0.2, 85_000, sr)),
            ],
        };
        let options = MixOptions {
            output_dir: dir.path().join("out"),
            keep_reference_cuts: false,
        };

        let output_path = mix(&song1, &song2, &analyzer, &stem_store, &options).unwrap();
        assert!(output_path.is_file());
        assert_eq!(
            output_path.file_name().unwrap().to_str().unwrap(),
            "alpha_beta_loop_t0m35s.wav"
        );

        let written = wav::read(&output_path).unwrap();
        assert_eq!(written.len(), 144_000);
        assert!(written.peak() <= 0.9 + 1e-3);
    }

    /// Scenario S2 (spec.md §8): incompatible keys but bpm_diff <= 5 ->
    /// tight, via the short-chorus fallback variant (scenario S5).
    #[test]
    fn scenario_s2_and_s5_end_to_end_tight_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let song1 = dir.path().join("gamma.wav");
        let song2 = dir.path().join("delta.wav");
        let sr = 2_000u32;
        write_track(&song1, 60_000, sr);
        write_track(&song2, 120_000, sr);
        let a_analysis = TrackAnalysis {
            bpm: 128.0,
            camelot: camelot_key(8, Ring::Major),
            choruses: vec![Section::new(3.0, 13.0)],
            verses: vec![Section::new(0.0, 3.0)],
        };
        let b_analysis = TrackAnalysis {
            bpm: 128.0,
            camelot: camelot_key(3, Ring::Minor),
            choruses: vec![Section::new(1.0, 9.0)],
            verses: vec![Section::new(0.0, 1.0), Section::new(9.5, 60.0)],
        };
        assert!(!mix::key_ok(
            Camelot::new(8, Ring::Major),
            Camelot::new(3, Ring::Minor)
        ));

        let analyzer = FakeAnalyzer {
            entries: vec![(song1.clone(), a_analysis), (song2.clone(), b_analysis)],
        };
        let stem_store = FakeStemStore {
            entries: vec![
                (song1.clone(), flat_stem_set(0.1, 60_000, sr)),
                (song2.clone(), flat_stem_set(0.2, 120_000, sr)),
            ],
        };
        let options = MixOptions {
            output_dir: dir.path().join("out"),
            keep_reference_cuts: false,
        };

        let output_path = mix(&song1, &song2, &analyzer, &stem_store, &options).unwrap();
        assert!(output_path.is_file());
        let filename = output_path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(filename.starts_with("gamma_delta_tight_t"));
    }

    /// Scenario S6 (spec.md §8): a required section is missing -> the
    /// orchestrator reports a prerequisite error instead of panicking.
    #[test]
    fn scenario_s6_missing_chorus_is_a_prerequisite_error() {
        let dir = tempfile::tempdir().unwrap();
        let song1 = dir.path().join("epsilon.wav");
        let song2 = dir.path().join("zeta.wav");
        let sr = 2_000u32;
        write_track(&song1, 75_000, sr);
        write_track(&song2, 85_000, sr);
        let a_analysis = TrackAnalysis {
            bpm: 128.0,
            camelot: camelot_key(8, Ring::Major),
            choruses: vec![],
            verses: vec![Section::new(0.0, 5.0)],
        };
        let b_analysis = TrackAnalysis {
            bpm: 128.0,
            camelot: camelot_key(8, Ring::Major),
            choruses: vec![Section::new(2.0, 10.0)],
            verses: vec![Section::new(0.0, 2.0), Section::new(11.0, 40.0)],
        };
        let analyzer = FakeAnalyzer {
            entries: vec![(song1.clone(), a_analysis), (song2.clone(), b_analysis)],
        };
        let stem_store = FakeStemStore {
            entries: vec![
                (song1.clone(), flat_stem_set(0.1, 75_000, sr)),
                (song2.clone(), flat_stem_set(0.2, 85_000, sr)),
            ],
        };
        let options = MixOptions {
            output_dir: dir.path().join("out"),
            keep_reference_cuts: false,
        };

        let err = mix(&song1, &song2, &analyzer, &stem_store, &options).unwrap_err();
        assert!(matches!(err, MixError::PrerequisiteError(_)));
    }

    #[test]
    fn missing_input_file_errors_before_any_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let song1 = dir.path().join("missing.wav");
        let song2 = dir.path().join("also_missing.wav");
        let analyzer = FakeAnalyzer { entries: vec![] };
        let stem_store = FakeStemStore { entries: vec![] };
        let options = MixOptions {
            output_dir: dir.path().join("out"),
            keep_reference_cuts: false,
        };

        let err = mix(&song1, &song2, &analyzer, &stem_store, &options).unwrap_err();
        assert!(matches!(err, MixError::FileNotFound(_)));
    }

    /// Scenario S4 (spec.md §8): incompatible keys and bpm_diff > 15 ->
    /// loose. Exercises the one orchestrator branch (second-verse-on-track-A
    /// prerequisite, non-trivial `stretch_rate`) none of the other
    /// end-to-end tests reach.
    #[test]
    fn scenario_s4_end_to_end_loose() {
        let dir = tempfile::tempdir().unwrap();
        let song1 = dir.path().join("theta.wav");
        let song2 = dir.path().join("iota.wav");
        let sr = 2_000u32;
        write_track(&song1, 600_000, sr);
        write_track(&song2, 700_000, sr);
        let a_analysis = TrackAnalysis {
            bpm: 145.0,
            camelot: camelot_key(8, Ring::Major),
            choruses: vec![Section::new(3.0, 10.0)],
            verses: vec![Section::new(0.0, 3.0), Section::new(15.0, 45.0)],
        };
        let b_analysis = TrackAnalysis {
            bpm: 128.0,
            camelot: camelot_key(2, Ring::Minor),
            choruses: vec![Section::new(2.0, 9.0)],
            verses: vec![Section::new(0.0, 2.0), Section::new(10.0, 60.0)],
        };
        assert_eq!(
            mix::select_strategy(
                mix::bpm_diff(a_analysis.bpm, b_analysis.bpm),
                mix::key_ok(
                    Camelot::new(8, Ring::Major),
                    Camelot::new(2, Ring::Minor)
                )
            ),
            Strategy::Loose
        );

        let analyzer = FakeAnalyzer {
            entries: vec![(song1.clone(), a_analysis), (song2.clone(), b_analysis)],
        };
        let stem_store = FakeStemStore {
            entries: vec![
                (song1.clone(), flat_stem_set(0.1, 600_000, sr)),
                (song2.clone(), flat_stem_set(0.2, 700_000, sr)),
            ],
        };
        let options = MixOptions {
            output_dir: dir.path().join("out"),
            keep_reference_cuts: false,
        };

        let output_path = mix(&song1, &song2, &analyzer, &stem_store, &options).unwrap();
        assert!(output_path.is_file());
        let filename = output_path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(filename.starts_with("theta_iota_loose_t"));

        let written = wav::read(&output_path).unwrap();
        assert!(!written.is_empty());
        assert!(written.peak() <= 0.9 + 1e-3);
    }
}
