//! Speech synthesis for the Chorus relay.
//!
//! Sends accumulated answer text to a streaming text-to-speech service and
//! decodes its server-pushed results into audio bytes and a final playable
//! URL. Text is passed through [`normalize`] first so that emoji and
//! punctuation are never read aloud.

pub mod config;
pub mod error;
pub mod normalize;
pub mod tts;

pub use config::SynthesisConfig;
pub use error::VoiceError;
pub use normalize::normalize;
pub use tts::{parse_event, DashScopeSynthesizer, SpeechSynthesizer, SynthesisEvent, SynthesisStream};
