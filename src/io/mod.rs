//! Audio I/O: WAV read/write plus generic decode for other input formats.

pub mod wav;

use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::MixError;
use crate::types::AudioBuffer;

/// Reads any input track. WAV goes through `hound` directly (matching the
/// output writer's own format); anything else decodes via `symphonia`.
pub fn read_track(path: &Path) -> Result<AudioBuffer, MixError> {
    if !path.is_file() {
        return Err(MixError::FileNotFound(path.to_path_buf()));
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("wav") => wav::read(path),
        _ => decode_generic(path),
    }
}

fn decode_generic(path: &Path) -> Result<AudioBuffer, MixError> {
    let file = std::fs::File::open(path).map_err(MixError::IoError)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| MixError::DecodeError(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| MixError::DecodeError("no decodable track found".into()))?;
    let track_id = track.id;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| MixError::DecodeError(e.to_string()))?;

    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44_100);
    let mut left: Vec<f32> = Vec::new();
    let mut right: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(e) => return Err(MixError::DecodeError(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = decoder
            .decode(&packet)
            .map_err(|e| MixError::DecodeError(e.to_string()))?;

        sample_rate = decoded.spec().rate;
        let channels = decoded.spec().channels.count();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        sample_buf.copy_interleaved_ref(decoded);
        let interleaved = sample_buf.samples();

        if channels >= 2 {
            left.extend(interleaved.iter().step_by(channels).copied());
            right.extend(interleaved.iter().skip(1).step_by(channels).copied());
        } else {
            left.extend_from_slice(interleaved);
            right.extend_from_slice(interleaved);
        }
    }

    if left.is_empty() {
        return Err(MixError::DecodeError("decoded zero samples".into()));
    }
    Ok(AudioBuffer::from_channels(&left, &right, sample_rate))
}
