//! Demo binary: runs one mock interview against a configured service
//! endpoint with a synthetic capture tone and a timer-driven playback
//! sink, then prints the final transcript.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;

use interview_live_rs::audio::{AudioChunk, PlaybackSink, PlaybackToken, ToneCapture};
use interview_live_rs::error::SessionResult;
use interview_live_rs::{Session, SessionCommand, SessionConfig, StatusUpdate};

/// Stands in for a real output device: chunks "play" on a wall-clock
/// timer and report completion when their scheduled window ends.
struct TimedSink {
    epoch: std::time::Instant,
    done_tx: mpsc::Sender<PlaybackToken>,
    pending: HashMap<PlaybackToken, tokio::task::JoinHandle<()>>,
}

impl TimedSink {
    fn new(done_tx: mpsc::Sender<PlaybackToken>) -> Self {
        Self {
            epoch: std::time::Instant::now(),
            done_tx,
            pending: HashMap::new(),
        }
    }
}

impl PlaybackSink for TimedSink {
    fn current_time(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn schedule(
        &mut self,
        token: PlaybackToken,
        chunk: AudioChunk,
        start_time: f64,
    ) -> SessionResult<()> {
        let duration = chunk.duration_secs();
        log::info!("Playing {:.2}s of audio at t={:.2}", duration, start_time);

        let ends_in = (start_time + duration - self.current_time()).max(0.0);
        let done_tx = self.done_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(ends_in)).await;
            let _ = done_tx.send(token).await;
        });
        self.pending.insert(token, task);
        Ok(())
    }

    fn stop(&mut self, token: PlaybackToken) {
        if let Some(task) = self.pending.remove(&token) {
            task.abort();
        }
    }
}

fn config_from_env() -> anyhow::Result<SessionConfig> {
    let server_url =
        std::env::var("INTERVIEW_WS_URL").context("INTERVIEW_WS_URL must be set")?;
    let api_token = std::env::var("INTERVIEW_API_TOKEN").unwrap_or_default();
    let voice =
        std::env::var("INTERVIEW_VOICE").unwrap_or_else(|_| SessionConfig::default().voice);

    Ok(SessionConfig {
        server_url,
        api_token,
        voice,
        questions: vec![
            "Tell me about yourself.".to_string(),
            "Describe a difficult bug you fixed recently.".to_string(),
            "Why do you want this role?".to_string(),
        ],
        job_description: "Systems engineer building realtime audio services.".to_string(),
        resume: "Five years of network and audio pipeline work.".to_string(),
        ..Default::default()
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = config_from_env()?;

    let (done_tx, done_rx) = mpsc::channel(32);
    let sink = TimedSink::new(done_tx);
    let device = ToneCapture::new(440.0, 1600);

    let (handle, mut status_rx) = Session::start(config, device, sink, done_rx)
        .await
        .context("failed to start session")?;

    tokio::spawn(async move {
        while let Some(update) = status_rx.recv().await {
            match update {
                StatusUpdate::State(state) => log::info!("Session state: {:?}", state),
                StatusUpdate::Caption(text) if !text.is_empty() => {
                    log::info!("Interviewer: {}", text)
                }
                StatusUpdate::Caption(_) => {}
                StatusUpdate::Volume(level) => log::trace!("Volume: {:.2}", level),
            }
        }
    });

    let commands = handle.commands();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted, ending session");
            let _ = commands.send(SessionCommand::End).await;
        }
    });

    let transcript = handle.wait().await;

    println!("\n--- Transcript ({} turns) ---", transcript.len());
    for turn in &transcript {
        println!("[{:?}] {}", turn.role, turn.text);
    }
    Ok(())
}
