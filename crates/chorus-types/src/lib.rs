//! Shared types for the Chorus relay.
//!
//! This crate holds the wire-level types that cross crate boundaries: the
//! chat history message, the text chunk forwarded to clients and to the audio
//! pipeline, and the completion notice written to audio clients. It also
//! carries the server-sent-event decoder used by both upstream clients.
//!
//! Nothing here performs I/O.

pub mod sse;

use serde::{Deserialize, Serialize};

/// Content of the chunk that marks the end of a generation turn.
///
/// Never spoken; the audio pipeline treats it as a flush trigger.
pub const TURN_SENTINEL: &str = "\n\n";

/// Author of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A message typed by the text client.
    User,
    /// A completed answer from the generation backend.
    Assistant,
}

/// One role-tagged entry of a session's conversational history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A fragment of assistant text tagged with its turn correlation ID.
///
/// Serialized as `{"id", "content", "url"}` for the text client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Correlation ID shared by every chunk of one turn.
    pub id: String,
    /// Assistant text, or [`TURN_SENTINEL`] at the end of a turn.
    pub content: String,
    /// Playable audio reference, set only alongside a finished synthesis.
    #[serde(default)]
    pub url: Option<String>,
}

impl TextChunk {
    /// Creates a content chunk for the given turn.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            url: None,
        }
    }

    /// Creates the end-of-turn marker for the given turn.
    pub fn sentinel(id: impl Into<String>) -> Self {
        Self::new(id, TURN_SENTINEL)
    }

    /// Returns `true` if this chunk marks the end of its turn.
    pub fn is_sentinel(&self) -> bool {
        self.content == TURN_SENTINEL
    }
}

/// Notice written to the audio client when a synthesis call yields a URL.
///
/// Field names follow the browser client: `messageID`, `audioUrl`,
/// `isSegment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioNotice {
    /// Turn correlation ID of the text that was synthesized.
    #[serde(rename = "messageID")]
    pub message_id: String,
    #[serde(rename = "audioUrl")]
    pub audio_url: String,
    /// `true` for a segment flush, `false` for the whole-turn replay.
    #[serde(rename = "isSegment")]
    pub is_segment: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_chunk_serializes_all_fields() {
        let chunk = TextChunk::new("turn-1", "Hi");
        let json = serde_json::to_value(&chunk).expect("serialization should not fail");
        assert_eq!(json["id"], "turn-1");
        assert_eq!(json["content"], "Hi");
        assert!(json.get("url").is_some(), "url key should always be present");
        assert!(json["url"].is_null());
    }

    #[test]
    fn sentinel_is_detected() {
        let chunk = TextChunk::sentinel("turn-1");
        assert!(chunk.is_sentinel());
        assert_eq!(chunk.content, "\n\n");
        assert!(!TextChunk::new("turn-1", "\n").is_sentinel());
    }

    #[test]
    fn audio_notice_uses_client_field_names() {
        let notice = AudioNotice {
            message_id: "turn-9".to_string(),
            audio_url: "http://example.test/a.wav".to_string(),
            is_segment: true,
        };
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["messageID"], "turn-9");
        assert_eq!(json["audioUrl"], "http://example.test/a.wav");
        assert_eq!(json["isSegment"], true);
        assert!(json.get("message_id").is_none());
    }

    #[test]
    fn chat_message_role_is_lowercase() {
        let json = serde_json::to_value(ChatMessage::assistant("ok")).unwrap();
        assert_eq!(json["role"], "assistant");
        let json = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
    }
}
