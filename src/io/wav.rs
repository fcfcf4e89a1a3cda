//! WAV read/write via `hound`.
//!
//! Grounded on `mesh-cue::separation::backend::write_to_wav_files`'s
//! hound-based writer; reading always produces an `AudioBuffer` already
//! promoted to stereo.

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::MixError;
use crate::types::AudioBuffer;

/// Reads a WAV file into stereo `f32` samples. Mono files are promoted to
/// stereo by channel duplication (spec.md §3).
pub fn read(path: &Path) -> Result<AudioBuffer, MixError> {
    if !path.is_file() {
        return Err(MixError::FileNotFound(path.to_path_buf()));
    }
    let mut reader =
        hound::WavReader::open(path).map_err(|e| MixError::DecodeError(e.to_string()))?;
    let spec = reader.spec();
    let sample_rate = spec.sample_rate;

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| MixError::DecodeError(e.to_string()))?,
        SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<_, _>>()
                .map_err(|e| MixError::DecodeError(e.to_string()))?
        }
    };

    match spec.channels {
        1 => Ok(AudioBuffer::from_mono(&samples, sample_rate)),
        2 => {
            let left: Vec<f32> = samples.iter().step_by(2).copied().collect();
            let right: Vec<f32> = samples.iter().skip(1).step_by(2).copied().collect();
            Ok(AudioBuffer::from_channels(&left, &right, sample_rate))
        }
        n => Err(MixError::DecodeError(format!(
            "unsupported channel count {n}, expected mono or stereo"
        ))),
    }
}

/// Writes stereo audio as a RIFF WAV, 32-bit float PCM (spec.md §6/§7
/// output-file contract).
pub fn write(path: &Path, buffer: &AudioBuffer) -> Result<(), MixError> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer =
        WavWriter::create(path, spec).map_err(|e| MixError::DecodeError(e.to_string()))?;
    for s in buffer.as_interleaved() {
        writer
            .write_sample(*s)
            .map_err(|e| MixError::DecodeError(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| MixError::DecodeError(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    #[test]
    fn write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wav");
        let samples = vec![
            StereoSample::new(0.1, -0.1),
            StereoSample::new(0.5, 0.25),
            StereoSample::new(-0.9, 0.9),
        ];
        let buffer = AudioBuffer::from_stereo_samples(samples.clone(), 44_100);
        write(&path, &buffer).unwrap();

        let back = read(&path).unwrap();
        assert_eq!(back.sample_rate, 44_100);
        assert_eq!(back.len(), samples.len());
        for (a, b) in back.as_slice().iter().zip(samples.iter()) {
            assert!((a.left - b.left).abs() < 1e-5);
            assert!((a.right - b.right).abs() < 1e-5);
        }
    }

    #[test]
    fn mono_wav_is_promoted_to_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 22_050,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for v in [0.1f32, 0.2, 0.3] {
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = read(&path).unwrap();
        assert_eq!(buffer.as_slice()[1], StereoSample::new(0.2, 0.2));
    }

    #[test]
    fn missing_file_errors() {
        let err = read(Path::new("/nonexistent/path/x.wav")).unwrap_err();
        assert!(matches!(err, MixError::FileNotFound(_)));
    }
}
