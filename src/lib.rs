//! Real-time duplex voice interview sessions.
//!
//! The crate captures microphone audio, streams it to a conversational
//! service over a duplex WebSocket, schedules the synthesized replies for
//! gapless playback, reconstructs a turn-structured transcript from
//! streamed fragments, and detects when the interviewer closes the
//! session. Capture and playback devices are supplied by the embedding
//! application through the [`audio::CaptureDevice`] and
//! [`audio::PlaybackSink`] seams.

pub mod audio;
pub mod config;
pub mod controller;
pub mod error;
pub mod net_link;
pub mod protocol;
pub mod transcript;

pub use config::{SessionConfig, VOICES};
pub use controller::{Session, SessionCommand, SessionHandle, SessionState, StatusUpdate};
pub use error::{SessionError, SessionResult};
pub use transcript::{ConversationTurn, Speaker};
