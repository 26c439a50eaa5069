use crate::config::ChatConfig;
use crate::error::ChatError;
use async_trait::async_trait;
use chorus_types::{sse, ChatMessage};
use futures_util::future;
use futures_util::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::pin::Pin;
use std::time::Duration;

/// Content deltas of one streamed completion, in arrival order.
///
/// The stream ends cleanly on end-of-data; an `Err` item means the
/// completion failed mid-turn.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

/// Payload that terminates an OpenAI-style event stream.
const DONE_MARKER: &str = "[DONE]";

/// A text-generation backend that streams its answer.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Opens a streamed completion with `history` as the full context.
    async fn stream_chat(&self, history: &[ChatMessage]) -> Result<DeltaStream, ChatError>;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    http: reqwest::Client,
    config: ChatConfig,
}

impl OpenAiChatClient {
    /// Builds a client, failing with [`ChatError::Config`] when a credential,
    /// endpoint or model is missing.
    pub fn new(config: ChatConfig) -> Result<Self, ChatError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    delta: CompletionDelta,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Meaning of a single `data:` payload.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StreamItem {
    Delta(String),
    /// Role-only or empty deltas, keep-alives.
    Skip,
    Done,
}

pub(crate) fn parse_payload(payload: &str) -> Result<StreamItem, ChatError> {
    if payload == DONE_MARKER {
        return Ok(StreamItem::Done);
    }

    let chunk: CompletionChunk =
        serde_json::from_str(payload).map_err(|e| ChatError::Parse(e.to_string()))?;

    match chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
    {
        Some(content) if !content.is_empty() => Ok(StreamItem::Delta(content)),
        _ => Ok(StreamItem::Skip),
    }
}

#[async_trait]
impl ChatBackend for OpenAiChatClient {
    async fn stream_chat(&self, history: &[ChatMessage]) -> Result<DeltaStream, ChatError> {
        let body = json!({
            "model": self.config.model,
            "messages": history,
            "stream": true,
        });

        let response = self
            .http
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(
            model = %self.config.model,
            messages = history.len(),
            "chat completion stream opened"
        );

        let deltas = sse::data_payloads(Box::pin(response.bytes_stream()))
            .map(|item| {
                item.map_err(ChatError::from)
                    .and_then(|payload| parse_payload(&payload))
            })
            .take_while(|item| future::ready(!matches!(item, Ok(StreamItem::Done))))
            .filter_map(|item| async move {
                match item {
                    Ok(StreamItem::Delta(content)) => Some(Ok(content)),
                    Ok(_) => None,
                    Err(e) => Some(Err(e)),
                }
            });

        Ok(Box::pin(deltas))
    }
}
