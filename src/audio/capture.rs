//! Capture device contract.
//!
//! The embedding application supplies the real microphone; the session
//! only needs a stream of normalized sample buffers at the outbound wire
//! rate. Acquisition failure is fatal to the attempted session — there is
//! no retry.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{SessionError, SessionResult};

/// One buffer of captured samples, normalized to [-1, 1].
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    pub samples: Vec<f32>,
    /// Capture time, epoch milliseconds.
    pub timestamp_ms: u64,
}

/// A microphone-like source producing frames at a fixed cadence once
/// opened.
#[async_trait]
pub trait CaptureDevice: Send {
    /// Acquire the device and start delivering frames at `sample_rate`.
    async fn open(&mut self, sample_rate: u32) -> SessionResult<mpsc::Receiver<CaptureFrame>>;

    /// Stop capture and release the device. Safe to call more than once.
    async fn close(&mut self);
}

/// Synthetic capture source for the demo binary: a quiet sine tone
/// delivered in fixed-size frames, standing in for a real microphone.
pub struct ToneCapture {
    frequency_hz: f32,
    frame_len: usize,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl ToneCapture {
    pub fn new(frequency_hz: f32, frame_len: usize) -> Self {
        Self {
            frequency_hz,
            frame_len,
            task: None,
        }
    }
}

#[async_trait]
impl CaptureDevice for ToneCapture {
    async fn open(&mut self, sample_rate: u32) -> SessionResult<mpsc::Receiver<CaptureFrame>> {
        if self.frame_len == 0 {
            return Err(SessionError::DeviceAcquisition(
                "frame length must be non-zero".into(),
            ));
        }

        let (tx, rx) = mpsc::channel(16);
        let frame_len = self.frame_len;
        let step = self.frequency_hz * std::f32::consts::TAU / sample_rate as f32;
        let frame_period =
            std::time::Duration::from_secs_f64(frame_len as f64 / sample_rate as f64);

        let task = tokio::spawn(async move {
            let mut phase = 0.0f32;
            let mut ticker = tokio::time::interval(frame_period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let samples: Vec<f32> = (0..frame_len)
                    .map(|_| {
                        phase = (phase + step) % std::f32::consts::TAU;
                        phase.sin() * 0.1
                    })
                    .collect();
                let frame = CaptureFrame {
                    samples,
                    timestamp_ms: now_ms(),
                };
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });
        self.task = Some(task);
        Ok(rx)
    }

    async fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub(crate) fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
