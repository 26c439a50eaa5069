use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed stream event: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
