//! Loudness metering for UI feedback.
//!
//! Observational only — nothing in the session's control flow depends on
//! these values.

use std::time::Duration;

/// Level emitted while synthesized speech is playing. Raw playback
/// samples are not separately inspectable once scheduled, so playback
/// activity is shown as a fixed pulse that decays when the chunk ends.
const PLAYBACK_PULSE_LEVEL: f32 = 0.8;

/// A metering emission: show `level` now, drop back to 0 after `hold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterPulse {
    pub level: f32,
    pub hold: Duration,
}

/// Computes bounded loudness values from capture samples and playback
/// activity.
#[derive(Debug, Clone, Copy)]
pub struct VolumeMeter {
    gain: f32,
}

impl VolumeMeter {
    pub fn new(gain: f32) -> Self {
        Self { gain }
    }

    /// Root-mean-square of the buffer, scaled by the gain and clamped to
    /// [0, 1].
    pub fn from_samples(&self, samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
        let rms = (sum_squares / samples.len() as f32).sqrt();
        (rms * self.gain).min(1.0)
    }

    /// Fixed-level pulse covering one scheduled playback chunk.
    pub fn from_playback_event(&self, duration_secs: f64) -> MeterPulse {
        MeterPulse {
            level: PLAYBACK_PULSE_LEVEL,
            hold: Duration::from_secs_f64(duration_secs.max(0.0)),
        }
    }
}
