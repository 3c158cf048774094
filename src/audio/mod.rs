//! audio - PCM codec, capture contract, playback scheduling, and metering
//! for the duplex voice session.
//!
//! The wire format is raw PCM (mono i16 LE, 16 kHz out / 24 kHz in)
//! carried text-safely over the conversational channel; the actual
//! capture and playback devices are trait seams supplied by the
//! embedding application.

pub mod capture;
pub mod meter;
pub mod pcm;
pub mod playback;

pub use capture::{CaptureDevice, CaptureFrame, ToneCapture};
pub use meter::{MeterPulse, VolumeMeter};
pub use pcm::AudioChunk;
pub use playback::{PlaybackScheduler, PlaybackSink, PlaybackToken};
