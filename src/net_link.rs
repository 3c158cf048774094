//! Duplex WebSocket link to the conversational service.
//!
//! `NetLink::connect` opens the channel, sends the session-setup message,
//! and spawns a pump task that forwards [`NetCommand`]s outbound and maps
//! inbound frames to [`ServerEvent`]s. Connection-level failures are
//! fatal: there is no reconnect, the session simply observes the error
//! event and tears down.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::protocol::{ClientMessage, NetCommand, ServerEvent, SessionSetup};

pub struct NetLink;

impl NetLink {
    /// Open the duplex stream and hand back its two ends: a sender for
    /// outbound commands and a receiver of inbound events.
    ///
    /// The session-setup message (modality, voice, system instruction,
    /// transcription flags) is sent before this returns; the service's
    /// own open acknowledgment arrives as [`ServerEvent::Opened`] on the
    /// event stream.
    pub async fn connect(
        config: &SessionConfig,
    ) -> SessionResult<(mpsc::Sender<NetCommand>, mpsc::Receiver<ServerEvent>)> {
        let url = Url::parse(&config.server_url)?;
        let host = url.host_str().unwrap_or("localhost");

        let request = tokio_tungstenite::tungstenite::http::Request::builder()
            .method("GET")
            .uri(config.server_url.as_str())
            .header("Host", host)
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header(
                "Sec-WebSocket-Key",
                tokio_tungstenite::tungstenite::handshake::client::generate_key(),
            )
            .header("Authorization", format!("Bearer {}", config.api_token))
            .header("Client-Id", Uuid::new_v4().to_string())
            .body(())
            .map_err(|e| SessionError::Stream(e.to_string()))?;

        log::info!("Connecting to {}...", config.server_url);
        let (ws_stream, _) = connect_async(request).await?;
        log::info!("Connected");

        let (mut write, read) = ws_stream.split();

        let setup = ClientMessage::Setup {
            config: SessionSetup {
                response_modality: "audio".to_string(),
                voice: config.voice.clone(),
                system_instruction: config.system_instruction(),
                input_transcription: config.transcribe_both_directions,
                output_transcription: true,
            },
        };
        let setup_json =
            serde_json::to_string(&setup).map_err(|e| SessionError::Stream(e.to_string()))?;
        write.send(Message::Text(setup_json.into())).await?;

        let (event_tx, event_rx) = mpsc::channel::<ServerEvent>(100);
        let (cmd_tx, cmd_rx) = mpsc::channel::<NetCommand>(100);

        tokio::spawn(async move {
            pump(write, read, event_tx, cmd_rx).await;
            log::info!("Net link closed");
        });

        Ok((cmd_tx, event_rx))
    }
}

type WsWrite = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    Message,
>;
type WsRead = futures_util::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
>;

async fn pump(
    mut write: WsWrite,
    mut read: WsRead,
    event_tx: mpsc::Sender<ServerEvent>,
    mut cmd_rx: mpsc::Receiver<NetCommand>,
) {
    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(event) => {
                                let closing = matches!(event, ServerEvent::Closed);
                                if event_tx.send(event).await.is_err() || closing {
                                    break;
                                }
                            }
                            Err(e) => {
                                log::warn!("Unrecognized server message ({}): {}", e, text);
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        log::info!("Server closed connection: {:?}", frame);
                        let _ = event_tx.send(ServerEvent::Closed).await;
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = event_tx
                            .send(ServerEvent::Error { message: e.to_string() })
                            .await;
                        break;
                    }
                    None => {
                        let _ = event_tx
                            .send(ServerEvent::Error {
                                message: "connection dropped".to_string(),
                            })
                            .await;
                        break;
                    }
                }
            }
            cmd = cmd_rx.recv() => {
                let outbound = match cmd {
                    Some(NetCommand::SendAudio(media)) => Some(ClientMessage::Audio { media }),
                    Some(NetCommand::SendText(text)) => Some(ClientMessage::Text { text }),
                    Some(NetCommand::Close) | None => {
                        let _ = write.close().await;
                        break;
                    }
                };
                if let Some(msg) = outbound {
                    let json = match serde_json::to_string(&msg) {
                        Ok(json) => json,
                        Err(e) => {
                            log::error!("Failed to serialize outbound message: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = write.send(Message::Text(json.into())).await {
                        let _ = event_tx
                            .send(ServerEvent::Error { message: e.to_string() })
                            .await;
                        break;
                    }
                }
            }
        }
    }
}
