//! End-to-end session flow driven through in-process channels: no
//! network, no real devices. Exercises the controller loop the way the
//! assembled session runs it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use interview_live_rs::audio::{AudioChunk, CaptureFrame, PlaybackSink, PlaybackToken, pcm};
use interview_live_rs::controller::{SessionController, SessionState, StatusUpdate};
use interview_live_rs::error::SessionResult;
use interview_live_rs::protocol::{NetCommand, ServerEvent};
use interview_live_rs::transcript::Speaker;
use interview_live_rs::SessionConfig;

#[derive(Default)]
struct SinkCounters {
    scheduled: usize,
    stopped: usize,
}

#[derive(Clone, Default)]
struct CountingSink(Arc<Mutex<SinkCounters>>);

impl PlaybackSink for CountingSink {
    fn current_time(&self) -> f64 {
        0.0
    }

    fn schedule(
        &mut self,
        _token: PlaybackToken,
        _chunk: AudioChunk,
        _start_time: f64,
    ) -> SessionResult<()> {
        self.0.lock().unwrap().scheduled += 1;
        Ok(())
    }

    fn stop(&mut self, _token: PlaybackToken) {
        self.0.lock().unwrap().stopped += 1;
    }
}

struct Rig {
    net_rx: mpsc::Receiver<NetCommand>,
    status_rx: mpsc::Receiver<StatusUpdate>,
    capture_tx: mpsc::Sender<CaptureFrame>,
    server_tx: mpsc::Sender<ServerEvent>,
    cmd_tx: mpsc::Sender<interview_live_rs::SessionCommand>,
    done_tx: Option<mpsc::Sender<PlaybackToken>>,
    sink: CountingSink,
    task: Option<tokio::task::JoinHandle<Vec<interview_live_rs::ConversationTurn>>>,
}

fn rig(config: SessionConfig) -> Rig {
    let (net_tx, net_rx) = mpsc::channel(100);
    let (status_tx, status_rx) = mpsc::channel(100);
    let (capture_tx, capture_rx) = mpsc::channel(16);
    let (server_tx, server_rx) = mpsc::channel(16);
    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let (done_tx, done_rx) = mpsc::channel::<PlaybackToken>(16);

    let sink = CountingSink::default();
    let controller = SessionController::new(config, sink.clone(), net_tx, status_tx);
    let task = tokio::spawn(controller.run(capture_rx, server_rx, cmd_rx, done_rx));

    Rig {
        net_rx,
        status_rx,
        capture_tx,
        server_tx,
        cmd_tx,
        done_tx: Some(done_tx),
        sink,
        task: Some(task),
    }
}

async fn recv_net(rig: &mut Rig) -> NetCommand {
    timeout(Duration::from_secs(1), rig.net_rx.recv())
        .await
        .expect("timed out waiting for outbound command")
        .expect("net channel closed")
}

async fn recv_status(rig: &mut Rig) -> StatusUpdate {
    timeout(Duration::from_secs(1), rig.status_rx.recv())
        .await
        .expect("timed out waiting for status update")
        .expect("status channel closed")
}

#[tokio::test]
async fn phrase_detection_ends_the_session_after_the_grace_delay() {
    let mut rig = rig(SessionConfig {
        end_grace_delay_ms: 50,
        ..Default::default()
    });

    rig.server_tx.send(ServerEvent::Opened).await.unwrap();
    assert!(matches!(recv_net(&mut rig).await, NetCommand::SendText(_)));
    assert_eq!(
        recv_status(&mut rig).await,
        StatusUpdate::State(SessionState::Active)
    );

    // Capture flows upstream while active and unmuted.
    rig.capture_tx
        .send(CaptureFrame {
            samples: vec![0.2; 160],
            timestamp_ms: 1,
        })
        .await
        .unwrap();
    assert!(matches!(recv_net(&mut rig).await, NetCommand::SendAudio(_)));
    assert!(matches!(
        recv_status(&mut rig).await,
        StatusUpdate::Volume(v) if v > 0.0
    ));

    // Synthesized audio is scheduled and pulses the meter.
    let media = pcm::to_wire(&vec![0.1; 2400], 24_000);
    rig.server_tx.send(ServerEvent::Audio { media }).await.unwrap();
    assert!(matches!(
        recv_status(&mut rig).await,
        StatusUpdate::Volume(v) if (v - 0.8).abs() < f32::EPSILON
    ));
    assert_eq!(rig.sink.0.lock().unwrap().scheduled, 1);

    // The interviewer closes the interview.
    rig.server_tx
        .send(ServerEvent::Transcript {
            role: Speaker::Interviewer,
            text: "Thank you, that concludes our interview.".to_string(),
        })
        .await
        .unwrap();
    // The playback pulse may decay (Volume 0.0) before the caption lands.
    let caption = loop {
        match recv_status(&mut rig).await {
            StatusUpdate::Caption(text) => break text,
            StatusUpdate::Volume(_) => {}
            other => panic!("unexpected status update: {:?}", other),
        }
    };
    assert!(caption.ends_with("interview."));
    rig.server_tx.send(ServerEvent::TurnComplete).await.unwrap();

    let transcript = timeout(Duration::from_secs(2), rig.task.take().unwrap())
        .await
        .expect("session did not end after the grace delay")
        .unwrap();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].role, Speaker::Interviewer);
    assert!(transcript[0].text.contains("concludes our interview"));

    // Teardown stopped the live playback handle and closed the link.
    assert_eq!(rig.sink.0.lock().unwrap().stopped, 1);
    let mut saw_close = false;
    while let Ok(cmd) = rig.net_rx.try_recv() {
        saw_close |= matches!(cmd, NetCommand::Close);
    }
    assert!(saw_close);
}

#[tokio::test(start_paused = true)]
async fn controller_loop_parks_after_the_completion_channel_closes() {
    let mut rig = rig(SessionConfig::default());

    rig.server_tx.send(ServerEvent::Opened).await.unwrap();
    assert!(matches!(recv_net(&mut rig).await, NetCommand::SendText(_)));
    assert_eq!(
        recv_status(&mut rig).await,
        StatusUpdate::State(SessionState::Active)
    );

    // The sink stops reporting completions mid-session.
    rig.done_tx.take();

    // Paused time only advances while every task is parked, so this
    // sleep completes only if the controller idles instead of spinning
    // on the closed channel.
    tokio::time::sleep(Duration::from_secs(60)).await;

    // The session is still responsive afterwards.
    rig.server_tx
        .send(ServerEvent::Transcript {
            role: Speaker::Interviewer,
            text: "Still with me?".to_string(),
        })
        .await
        .unwrap();
    assert!(matches!(
        recv_status(&mut rig).await,
        StatusUpdate::Caption(text) if text == "Still with me?"
    ));

    rig.cmd_tx
        .send(interview_live_rs::SessionCommand::End)
        .await
        .unwrap();
    let transcript = timeout(Duration::from_secs(1), rig.task.take().unwrap())
        .await
        .expect("session did not end on request")
        .unwrap();
    assert!(transcript.is_empty());
}

#[tokio::test]
async fn explicit_end_preempts_the_conversation_immediately() {
    let mut rig = rig(SessionConfig::default());

    rig.server_tx.send(ServerEvent::Opened).await.unwrap();
    assert!(matches!(recv_net(&mut rig).await, NetCommand::SendText(_)));
    assert_eq!(
        recv_status(&mut rig).await,
        StatusUpdate::State(SessionState::Active)
    );

    rig.server_tx
        .send(ServerEvent::Transcript {
            role: Speaker::Candidate,
            text: "I once debugged".to_string(),
        })
        .await
        .unwrap();

    rig.cmd_tx
        .send(interview_live_rs::SessionCommand::End)
        .await
        .unwrap();

    // Mid-turn fragments that never saw a boundary are not flushed.
    let transcript = timeout(Duration::from_secs(1), rig.task.take().unwrap())
        .await
        .expect("session did not end on request")
        .unwrap();
    assert!(transcript.is_empty());

    assert_eq!(
        recv_status(&mut rig).await,
        StatusUpdate::State(SessionState::Ending)
    );
    assert_eq!(
        recv_status(&mut rig).await,
        StatusUpdate::State(SessionState::Closed)
    );
}
