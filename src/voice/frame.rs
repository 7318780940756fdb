//! Inbound audio frame decoding

use crate::{Error, Result};

/// Sample rate expected from clients (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Divisor that maps an `i16` sample into [-1.0, 1.0]
const I16_SCALE: f32 = 32768.0;

/// Decode a binary frame of 16-bit little-endian PCM into normalized samples
///
/// A trailing odd byte (partial sample) is dropped.
#[must_use]
pub fn ingest(bytes: &[u8]) -> Vec<f32> {
    ingest_with_report(bytes).0
}

/// Decode a frame and report how many trailing bytes were discarded
///
/// The second value is `1` when the frame had an odd length, `0` otherwise.
#[must_use]
pub fn ingest_with_report(bytes: &[u8]) -> (Vec<f32>, usize) {
    let chunks = bytes.chunks_exact(2);
    let dropped = chunks.remainder().len();

    let samples = chunks
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / I16_SCALE)
        .collect();

    (samples, dropped)
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * I16_SCALE).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
