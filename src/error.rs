//! Session error taxonomy.
//!
//! Two recovery policies exist: connection-level failures
//! (`DeviceAcquisition`, `Stream`) terminate the session, while per-chunk
//! failures (`MalformedAudio`, `PlaybackScheduling`) drop the offending
//! chunk and let the session continue.

use std::fmt;

#[derive(Debug)]
pub enum SessionError {
    /// Capture device unavailable or permission denied. Fatal, no retry.
    DeviceAcquisition(String),
    /// Duplex channel failed to open or dropped mid-session. Fatal.
    Stream(String),
    /// Audio data violating the wire-format contract. The chunk is dropped.
    MalformedAudio(String),
    /// Playback device rejected a scheduled buffer. The chunk is dropped.
    PlaybackScheduling(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::DeviceAcquisition(msg) => {
                write!(f, "capture device acquisition failed: {}", msg)
            }
            SessionError::Stream(msg) => write!(f, "stream error: {}", msg),
            SessionError::MalformedAudio(msg) => write!(f, "malformed audio: {}", msg),
            SessionError::PlaybackScheduling(msg) => {
                write!(f, "playback scheduling failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for SessionError {}

impl SessionError {
    /// Whether this error terminates the session (as opposed to dropping
    /// one offending chunk).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::DeviceAcquisition(_) | SessionError::Stream(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SessionError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SessionError::Stream(err.to_string())
    }
}

impl From<url::ParseError> for SessionError {
    fn from(err: url::ParseError) -> Self {
        SessionError::Stream(format!("invalid service url: {}", err))
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
