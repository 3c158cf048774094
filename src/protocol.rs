//! Wire messages for the duplex conversational stream.

use serde::{Deserialize, Serialize};

use crate::transcript::Speaker;

/// A text-safely encoded audio chunk: base64 payload plus a media-type
/// tag declaring the PCM sample rate, e.g. `audio/pcm;rate=16000`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioPayload {
    pub mime_type: String,
    pub data: String,
}

/// Session parameters sent once when the stream opens.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSetup {
    pub response_modality: String,
    pub voice: String,
    pub system_instruction: String,
    pub input_transcription: bool,
    pub output_transcription: bool,
}

/// Outbound messages on the duplex channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Setup { config: SessionSetup },
    Audio { media: AudioPayload },
    Text { text: String },
}

/// Inbound events from the conversational service.
///
/// An exhaustive tagged type so the controller's steady-state dispatch
/// can be tested without a live network.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Stream-open acknowledgment.
    Opened,
    /// Synthesized speech chunk.
    Audio { media: AudioPayload },
    /// Incremental transcript fragment for one role.
    Transcript { role: Speaker, text: String },
    /// Utterance boundary; pending fragments flush now.
    TurnComplete,
    /// Server closed the stream.
    Closed,
    /// Server-side error.
    Error { message: String },
}

/// Commands accepted by the net link's outbound half.
#[derive(Debug)]
pub enum NetCommand {
    SendAudio(AudioPayload),
    SendText(String),
    Close,
}
