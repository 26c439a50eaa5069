//! Generation-backend client for the Chorus relay.
//!
//! Opens a streaming chat completion against an OpenAI-compatible endpoint
//! with the full conversational history and yields the assistant's content
//! deltas as they arrive. The pipeline talks to the backend only through the
//! [`ChatBackend`] trait so tests can substitute a scripted stream.

pub mod client;
pub mod config;
pub mod error;

pub use client::{ChatBackend, DeltaStream, OpenAiChatClient};
pub use config::ChatConfig;
pub use error::ChatError;
