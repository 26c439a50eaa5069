use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TTS API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed synthesis event: {0}")]
    MalformedEvent(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("TTS error: {0}")]
    Tts(String),
}
