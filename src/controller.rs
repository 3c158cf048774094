//! Session state machine.
//!
//! One cooperative event loop owns every piece of mutable session state:
//! capture frames, inbound server events, user commands, and playback
//! completions are all funneled through `tokio::select!` and handled to
//! completion before the next event is dispatched, so no mutation races
//! another. All teardown paths (user end, termination phrase, stream
//! error, capture loss) converge on one close routine.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

use crate::audio::capture::now_ms;
use crate::audio::{
    CaptureDevice, CaptureFrame, PlaybackScheduler, PlaybackSink, PlaybackToken, VolumeMeter,
};
use crate::audio::pcm;
use crate::config::{CAPTURE_SAMPLE_RATE, SessionConfig};
use crate::error::SessionResult;
use crate::net_link::NetLink;
use crate::protocol::{AudioPayload, NetCommand, ServerEvent};
use crate::transcript::{ConversationTurn, Speaker, TranscriptAggregator};

/// Sent once on stream-open so the remote agent speaks first.
const BEGIN_PROMPT: &str = "Hello. Please start the interview.";

/// Session lifecycle. Transitions are linear; no state is re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Ending,
    Closed,
}

/// Observable feed for the surrounding application: connection state,
/// the interviewer's live caption, and the bounded volume level.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    State(SessionState),
    Caption(String),
    Volume(f32),
}

/// Commands accepted from the surrounding application mid-session.
#[derive(Debug, Clone, Copy)]
pub enum SessionCommand {
    ToggleMute,
    End,
}

pub struct SessionController<S: PlaybackSink> {
    config: SessionConfig,
    state: SessionState,
    muted: bool,
    aggregator: TranscriptAggregator,
    scheduler: PlaybackScheduler<S>,
    meter: VolumeMeter,
    transcript: Vec<ConversationTurn>,
    net_tx: mpsc::Sender<NetCommand>,
    status_tx: mpsc::Sender<StatusUpdate>,
    /// When armed, the session closes at this instant. Armed once by
    /// termination-phrase detection; trailing audio does not cancel it.
    end_deadline: Option<Instant>,
    /// When the playback volume pulse decays back to zero.
    volume_reset_at: Option<Instant>,
}

impl<S: PlaybackSink> SessionController<S> {
    pub fn new(
        config: SessionConfig,
        sink: S,
        net_tx: mpsc::Sender<NetCommand>,
        status_tx: mpsc::Sender<StatusUpdate>,
    ) -> Self {
        let meter = VolumeMeter::new(config.meter_gain);
        Self {
            config,
            state: SessionState::Connecting,
            muted: false,
            aggregator: TranscriptAggregator::new(),
            scheduler: PlaybackScheduler::new(sink),
            meter,
            transcript: Vec::new(),
            net_tx,
            status_tx,
            end_deadline: None,
            volume_reset_at: None,
        }
    }

    /// Drive the session to completion and return the final transcript.
    pub async fn run(
        mut self,
        mut capture_rx: mpsc::Receiver<CaptureFrame>,
        mut server_rx: mpsc::Receiver<ServerEvent>,
        mut cmd_rx: mpsc::Receiver<SessionCommand>,
        mut playback_done_rx: mpsc::Receiver<PlaybackToken>,
    ) -> Vec<ConversationTurn> {
        // A sink may legitimately stop reporting completions (its sender
        // dropped); that arm must then be disabled rather than resolving
        // `None` on every iteration and spinning the loop hot.
        let mut done_open = true;
        loop {
            let end_at = self.end_deadline;
            let volume_reset_at = self.volume_reset_at;

            tokio::select! {
                frame = capture_rx.recv() => {
                    match frame {
                        Some(frame) => self.handle_capture_frame(frame).await,
                        None => {
                            log::warn!("Capture stream ended unexpectedly");
                            self.close_session().await;
                        }
                    }
                }
                event = server_rx.recv() => {
                    match event {
                        Some(event) => self.handle_server_event(event).await,
                        None => {
                            log::warn!("Server event stream ended");
                            self.close_session().await;
                        }
                    }
                }
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => self.close_session().await,
                    }
                }
                token = playback_done_rx.recv(), if done_open => {
                    match token {
                        Some(token) => self.scheduler.on_complete(token),
                        None => {
                            log::debug!("Playback completion channel closed");
                            done_open = false;
                        }
                    }
                }
                _ = sleep_until_opt(end_at) => {
                    log::info!("End grace delay elapsed, closing session");
                    self.close_session().await;
                }
                _ = sleep_until_opt(volume_reset_at) => {
                    self.volume_reset_at = None;
                    let _ = self.status_tx.send(StatusUpdate::Volume(0.0)).await;
                }
            }

            if self.state == SessionState::Closed {
                break;
            }
        }
        self.transcript
    }

    async fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Opened => {
                if self.state != SessionState::Connecting {
                    log::warn!("Unexpected open acknowledgment in {:?}", self.state);
                    return;
                }
                self.set_state(SessionState::Active).await;
                // The agent must lead: one synthetic prompt, then the
                // human only ever responds.
                let _ = self
                    .net_tx
                    .send(NetCommand::SendText(BEGIN_PROMPT.to_string()))
                    .await;
            }
            ServerEvent::Audio { media } => self.handle_audio(media).await,
            ServerEvent::Transcript { role, text } => {
                self.aggregator.append_fragment(role, &text);
                if role == Speaker::Interviewer {
                    let caption = self.aggregator.pending(Speaker::Interviewer).to_string();
                    let _ = self.status_tx.send(StatusUpdate::Caption(caption)).await;
                }
            }
            ServerEvent::TurnComplete => self.handle_turn_complete().await,
            ServerEvent::Closed => {
                log::info!("Server closed the session");
                self.close_session().await;
            }
            ServerEvent::Error { message } => {
                log::error!("Stream error: {}", message);
                self.close_session().await;
            }
        }
    }

    /// Decode and schedule one synthesized speech chunk. Malformed or
    /// rejected chunks are dropped and logged; the session continues.
    async fn handle_audio(&mut self, media: AudioPayload) {
        if self.state != SessionState::Active {
            return;
        }
        let chunk = match pcm::from_wire(&media) {
            Ok(chunk) => chunk,
            Err(e) => {
                log::warn!("Dropping inbound chunk: {}", e);
                return;
            }
        };
        let duration = chunk.duration_secs();
        if let Err(e) = self.scheduler.enqueue(chunk) {
            log::warn!("Dropping inbound chunk: {}", e);
            return;
        }

        let pulse = self.meter.from_playback_event(duration);
        let reset_at = Instant::now() + pulse.hold;
        self.volume_reset_at = Some(self.volume_reset_at.map_or(reset_at, |d| d.max(reset_at)));
        let _ = self.status_tx.send(StatusUpdate::Volume(pulse.level)).await;
    }

    async fn handle_turn_complete(&mut self) {
        let turns = self.aggregator.on_turn_complete(now_ms());
        let _ = self
            .status_tx
            .send(StatusUpdate::Caption(String::new()))
            .await;

        for turn in turns {
            if turn.role == Speaker::Interviewer
                && self.end_deadline.is_none()
                && turn
                    .text
                    .to_lowercase()
                    .contains(&self.config.termination_phrase)
            {
                log::info!(
                    "Termination phrase spoken, closing in {} ms",
                    self.config.end_grace_delay_ms
                );
                self.end_deadline = Some(
                    Instant::now() + Duration::from_millis(self.config.end_grace_delay_ms),
                );
            }
            self.transcript.push(turn);
        }
    }

    /// Capture keeps flowing to the meter while muted; only upstream
    /// delivery is gated.
    async fn handle_capture_frame(&mut self, frame: CaptureFrame) {
        let level = self.meter.from_samples(&frame.samples);
        let _ = self.status_tx.send(StatusUpdate::Volume(level)).await;

        if self.state == SessionState::Active && !self.muted {
            let payload = pcm::to_wire(&frame.samples, CAPTURE_SAMPLE_RATE);
            let _ = self.net_tx.send(NetCommand::SendAudio(payload)).await;
        }
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::ToggleMute => {
                self.muted = !self.muted;
                log::info!("Microphone {}", if self.muted { "muted" } else { "live" });
            }
            SessionCommand::End => {
                log::info!("Session end requested");
                self.close_session().await;
            }
        }
    }

    /// The single teardown routine every end path converges on. Safe to
    /// call at any point in the lifecycle, including repeatedly.
    async fn close_session(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if self.state == SessionState::Active {
            self.set_state(SessionState::Ending).await;
        }
        self.scheduler.cancel_all();
        let _ = self.net_tx.send(NetCommand::Close).await;
        self.end_deadline = None;
        self.set_state(SessionState::Closed).await;
    }

    async fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        log::debug!("Session state {:?} -> {:?}", self.state, state);
        self.state = state;
        let _ = self.status_tx.send(StatusUpdate::State(state)).await;
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// A running session as seen by the surrounding application.
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
    task: JoinHandle<Vec<ConversationTurn>>,
}

impl SessionHandle {
    /// A command sender for driving the session from elsewhere (e.g. a
    /// signal handler).
    pub fn commands(&self) -> mpsc::Sender<SessionCommand> {
        self.cmd_tx.clone()
    }

    pub async fn toggle_mute(&self) {
        let _ = self.cmd_tx.send(SessionCommand::ToggleMute).await;
    }

    /// End the session immediately and return the final transcript.
    pub async fn end(self) -> Vec<ConversationTurn> {
        let _ = self.cmd_tx.send(SessionCommand::End).await;
        self.task.await.unwrap_or_default()
    }

    /// Wait for the session to end on its own (termination phrase, server
    /// close, or stream failure) and return the final transcript.
    pub async fn wait(self) -> Vec<ConversationTurn> {
        self.task.await.unwrap_or_default()
    }
}

pub struct Session;

impl Session {
    /// Assemble and start a session: acquire the capture device, open the
    /// duplex stream, and spawn the controller loop.
    ///
    /// `playback_done_rx` delivers completion tokens from the supplied
    /// sink. Acquisition and connection failures are fatal and surface
    /// here; there is no retry.
    pub async fn start<D, S>(
        config: SessionConfig,
        mut device: D,
        sink: S,
        playback_done_rx: mpsc::Receiver<PlaybackToken>,
    ) -> SessionResult<(SessionHandle, mpsc::Receiver<StatusUpdate>)>
    where
        D: CaptureDevice + 'static,
        S: PlaybackSink + 'static,
    {
        let (status_tx, status_rx) = mpsc::channel(100);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let _ = status_tx
            .send(StatusUpdate::State(SessionState::Connecting))
            .await;

        let capture_rx = match device.open(CAPTURE_SAMPLE_RATE).await {
            Ok(rx) => rx,
            Err(e) => {
                let _ = status_tx.send(StatusUpdate::State(SessionState::Closed)).await;
                return Err(e);
            }
        };

        let (net_tx, server_rx) = match NetLink::connect(&config).await {
            Ok(link) => link,
            Err(e) => {
                device.close().await;
                let _ = status_tx.send(StatusUpdate::State(SessionState::Closed)).await;
                return Err(e);
            }
        };

        let controller = SessionController::new(config, sink, net_tx, status_tx);
        let task = tokio::spawn(async move {
            let transcript = controller
                .run(capture_rx, server_rx, cmd_rx, playback_done_rx)
                .await;
            device.close().await;
            transcript
        });

        Ok((SessionHandle { cmd_tx, task }, status_rx))
    }
}
