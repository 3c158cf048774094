//! Gapless playback scheduling.
//!
//! Synthesized audio arrives in bursts at network cadence while the
//! playback device consumes it at its own clock. Scheduling each chunk at
//! "now" would overlap bursts; scheduling only at enqueue time would leave
//! gaps under jitter. The scheduler therefore keeps a monotonic next-start
//! watermark on the *device's* time source and starts every chunk at
//! `max(device now, watermark)`.

use std::collections::HashSet;

use crate::audio::pcm::AudioChunk;
use crate::error::SessionResult;

/// Opaque token for one scheduled chunk. Owned by the scheduler from
/// `enqueue` until the sink reports natural completion (or `cancel_all`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackToken(u64);

/// The playback device contract, supplied by the embedding application.
///
/// `current_time` must be the device's own clock — never wall-clock time,
/// or the watermark drifts against actual playback. Completion of a
/// scheduled chunk is reported back out-of-band (the session driver routes
/// it to [`PlaybackScheduler::on_complete`]).
pub trait PlaybackSink: Send {
    /// Device clock, seconds.
    fn current_time(&self) -> f64;
    /// Schedule `chunk` to begin at `start_time` on the device clock.
    fn schedule(
        &mut self,
        token: PlaybackToken,
        chunk: AudioChunk,
        start_time: f64,
    ) -> SessionResult<()>;
    /// Force-stop a scheduled chunk regardless of playback position.
    fn stop(&mut self, token: PlaybackToken);
}

/// Serializes jittered chunk arrivals into back-to-back playback.
pub struct PlaybackScheduler<S: PlaybackSink> {
    sink: S,
    /// Earliest device time at which the next chunk may begin.
    /// Monotonically non-decreasing between resets.
    next_start: f64,
    live: HashSet<PlaybackToken>,
    next_token: u64,
}

impl<S: PlaybackSink> PlaybackScheduler<S> {
    pub fn new(sink: S) -> Self {
        let next_start = sink.current_time();
        Self {
            sink,
            next_start,
            live: HashSet::new(),
            next_token: 0,
        }
    }

    /// Schedule a chunk for gapless playback and return its committed
    /// start time.
    ///
    /// If the sink rejects the buffer the chunk is dropped and the
    /// watermark is left untouched, so the next chunk still lands
    /// back-to-back with the last accepted one.
    pub fn enqueue(&mut self, chunk: AudioChunk) -> SessionResult<f64> {
        let duration = chunk.duration_secs();
        let start = self.sink.current_time().max(self.next_start);

        let token = PlaybackToken(self.next_token);
        self.sink.schedule(token, chunk, start)?;
        self.next_token += 1;

        self.next_start = start + duration;
        self.live.insert(token);
        Ok(start)
    }

    /// Remove a handle whose playback finished naturally. This is the only
    /// path by which a live handle is discarded outside of `cancel_all`.
    pub fn on_complete(&mut self, token: PlaybackToken) {
        if !self.live.remove(&token) {
            log::debug!("completion for unknown playback token {:?}", token);
        }
    }

    /// Force-stop everything and reset the watermark to the device's
    /// current time so a subsequent session starts cleanly. No-op on an
    /// empty live set.
    pub fn cancel_all(&mut self) {
        for token in self.live.drain() {
            self.sink.stop(token);
        }
        self.next_start = self.sink.current_time();
    }

    pub fn live_handles(&self) -> usize {
        self.live.len()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
