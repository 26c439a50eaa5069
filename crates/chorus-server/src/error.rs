//! Failure taxonomy of the relay pipeline.

use chorus_chat::ChatError;
use chorus_voice::VoiceError;
use thiserror::Error;

/// Errors raised while creating sessions or relaying a turn.
///
/// Only [`RelayError::Connection`] ends the driver that owns the failed
/// connection; every other variant is local to one turn or one flush.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A required credential, endpoint or model is missing.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Reading from or writing to a client connection failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The generation backend failed before end-of-data.
    #[error("upstream stream error: {0}")]
    Upstream(#[from] ChatError),

    /// A synthesis call failed at the transport level.
    #[error("synthesis error: {0}")]
    Synthesis(#[from] VoiceError),

    /// The audio pipeline of this session was already cancelled.
    #[error("audio stream for session {0} was already cancelled")]
    DoubleCancellation(String),

    /// Another connection already holds this half of the session.
    #[error("session {session_id} already has an active {half} connection")]
    Busy {
        session_id: String,
        half: &'static str,
    },

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}
