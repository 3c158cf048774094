//! PCM codec: normalized f32 capture samples ⇄ i16 little-endian wire
//! samples, plus the base64 text-safe layer used to carry raw PCM over
//! the text-oriented duplex channel.
//!
//! Encoding is total over its domain (out-of-range samples are clamped);
//! decoding fails with `MalformedAudio` when the byte stream violates the
//! wire contract, and the offending chunk is dropped by the caller.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::config::PLAYBACK_SAMPLE_RATE;
use crate::error::{SessionError, SessionResult};
use crate::protocol::AudioPayload;

/// A playable audio buffer: de-interleaved normalized samples in [-1, 1],
/// one `Vec` per channel. Transient — lives for one decode/schedule pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub channel_data: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl AudioChunk {
    pub fn channels(&self) -> usize {
        self.channel_data.len()
    }

    /// Frames per channel.
    pub fn frames(&self) -> usize {
        self.channel_data.first().map_or(0, Vec::len)
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Encode normalized f32 samples as i16 LE PCM bytes.
///
/// Samples are clamped to [-1, 1] then scaled to the full signed 16-bit
/// range. Deterministic, never fails.
pub fn encode_samples(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let quantized = (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16;
        bytes.extend_from_slice(&quantized.to_le_bytes());
    }
    bytes
}

/// Decode i16 LE PCM bytes into a playable buffer, de-interleaving by
/// channel count and rescaling to [-1, 1].
pub fn decode_pcm(bytes: &[u8], sample_rate: u32, channels: usize) -> SessionResult<AudioChunk> {
    if channels == 0 {
        return Err(SessionError::MalformedAudio(
            "channel count must be non-zero".into(),
        ));
    }
    if bytes.len() % (2 * channels) != 0 {
        return Err(SessionError::MalformedAudio(format!(
            "byte length {} is not a multiple of 2 x {} channels",
            bytes.len(),
            channels
        )));
    }

    let frames = bytes.len() / (2 * channels);
    let mut channel_data: Vec<Vec<f32>> =
        (0..channels).map(|_| Vec::with_capacity(frames)).collect();
    for (i, pair) in bytes.chunks_exact(2).enumerate() {
        let sample = i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0;
        channel_data[i % channels].push(sample);
    }

    Ok(AudioChunk {
        channel_data,
        sample_rate,
    })
}

/// Encode capture samples into a text-safe wire payload with a media-type
/// tag declaring the PCM rate.
pub fn to_wire(samples: &[f32], sample_rate: u32) -> AudioPayload {
    AudioPayload {
        mime_type: format!("audio/pcm;rate={}", sample_rate),
        data: BASE64.encode(encode_samples(samples)),
    }
}

/// Decode a wire payload into a playable mono buffer. The sample rate is
/// read from the media-type tag, defaulting to the inbound synthesis rate.
pub fn from_wire(payload: &AudioPayload) -> SessionResult<AudioChunk> {
    let bytes = BASE64
        .decode(&payload.data)
        .map_err(|e| SessionError::MalformedAudio(format!("invalid base64: {}", e)))?;
    let rate = rate_from_mime(&payload.mime_type).unwrap_or(PLAYBACK_SAMPLE_RATE);
    decode_pcm(&bytes, rate, 1)
}

fn rate_from_mime(mime: &str) -> Option<u32> {
    mime.split(';')
        .find_map(|part| part.trim().strip_prefix("rate="))
        .and_then(|rate| rate.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip_is_within_one_quantization_step() {
        let samples: Vec<f32> = (0..480)
            .map(|i| (i as f32 / 480.0 * std::f32::consts::TAU).sin() * 0.7)
            .collect();

        let payload = to_wire(&samples, 16_000);
        assert_eq!(payload.mime_type, "audio/pcm;rate=16000");

        let chunk = from_wire(&payload).unwrap();
        assert_eq!(chunk.sample_rate, 16_000);
        assert_eq!(chunk.channels(), 1);
        assert_eq!(chunk.frames(), samples.len());
        for (orig, decoded) in samples.iter().zip(&chunk.channel_data[0]) {
            assert!((orig - decoded).abs() <= 1.5 / 32768.0, "{} vs {}", orig, decoded);
        }
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        let bytes = encode_samples(&[2.0, -3.5, 1.0, -1.0]);
        let chunk = decode_pcm(&bytes, 16_000, 1).unwrap();
        let decoded = &chunk.channel_data[0];
        assert!((decoded[0] - decoded[2]).abs() < f32::EPSILON);
        assert!((decoded[1] - decoded[3]).abs() < f32::EPSILON);
        assert!(decoded[0] > 0.999 && decoded[1] < -0.999);
    }

    #[test]
    fn decode_rejects_truncated_frames() {
        let err = decode_pcm(&[0, 1, 2], 24_000, 1).unwrap_err();
        assert!(matches!(err, SessionError::MalformedAudio(_)));
        assert!(!err.is_fatal());

        // Stereo needs multiples of 4 bytes.
        let err = decode_pcm(&[0, 1, 2, 3, 4, 5], 24_000, 2).unwrap_err();
        assert!(matches!(err, SessionError::MalformedAudio(_)));
    }

    #[test]
    fn decode_deinterleaves_by_channel() {
        // Frames: (1, -1), (2, -2) as raw i16.
        let mut bytes = Vec::new();
        for v in [1i16, -1, 2, -2] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let chunk = decode_pcm(&bytes, 24_000, 2).unwrap();
        assert_eq!(chunk.channels(), 2);
        assert_eq!(chunk.frames(), 2);
        assert!(chunk.channel_data[0].iter().all(|s| *s > 0.0));
        assert!(chunk.channel_data[1].iter().all(|s| *s < 0.0));
    }

    #[test]
    fn from_wire_rejects_invalid_base64() {
        let payload = AudioPayload {
            mime_type: "audio/pcm;rate=24000".into(),
            data: "not base64!!!".into(),
        };
        assert!(matches!(
            from_wire(&payload),
            Err(SessionError::MalformedAudio(_))
        ));
    }

    #[test]
    fn mime_rate_parsing_falls_back_to_synthesis_rate() {
        assert_eq!(rate_from_mime("audio/pcm;rate=16000"), Some(16_000));
        assert_eq!(rate_from_mime("audio/pcm"), None);

        let payload = to_wire(&[0.0; 24], 24_000);
        let untagged = AudioPayload {
            mime_type: "audio/pcm".into(),
            data: payload.data,
        };
        assert_eq!(from_wire(&untagged).unwrap().sample_rate, PLAYBACK_SAMPLE_RATE);
    }

    #[test]
    fn duration_follows_rate_and_frames() {
        let chunk = AudioChunk {
            channel_data: vec![vec![0.0; 24_000]],
            sample_rate: 24_000,
        };
        assert!((chunk.duration_secs() - 1.0).abs() < 1e-9);
    }
}
