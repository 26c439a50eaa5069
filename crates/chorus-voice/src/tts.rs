use crate::config::SynthesisConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use base64::Engine;
use chorus_types::sse;
use futures_util::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::pin::Pin;
use std::time::Duration;

/// Maximum text input size for TTS (64 KiB). Prevents resource exhaustion from
/// oversized synthesis requests.
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// `finish_reason` value carried by the terminal event of a stream.
const FINISH_STOP: &str = "stop";

/// One decoded result pushed by the synthesis service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisEvent {
    /// Decoded audio bytes for incremental playback.
    pub audio: Option<Vec<u8>>,
    /// Set only on the terminal event.
    pub finished: bool,
    /// Signed playable URL, present on the terminal event.
    pub url: Option<String>,
    /// Unix expiry of `url`.
    pub expires_at: Option<i64>,
}

/// Results of one synthesis call. Malformed events have already been
/// dropped; an `Err` item is a transport failure that ends the call.
pub type SynthesisStream = Pin<Box<dyn Stream<Item = Result<SynthesisEvent, VoiceError>> + Send>>;

/// A streaming text-to-speech service.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesisStream, VoiceError>;
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    output: RawOutput,
}

#[derive(Debug, Default, Deserialize)]
struct RawOutput {
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    audio: RawAudio,
}

#[derive(Debug, Default, Deserialize)]
struct RawAudio {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
}

/// Decodes one `data:` payload of the synthesis stream.
///
/// While streaming the service reports `finish_reason` as `null` or the
/// string `"null"`; only `"stop"` marks the terminal event.
pub fn parse_event(payload: &str) -> Result<SynthesisEvent, VoiceError> {
    let raw: RawEvent =
        serde_json::from_str(payload).map_err(|e| VoiceError::MalformedEvent(e.to_string()))?;

    let audio = match raw.output.audio.data.filter(|data| !data.is_empty()) {
        Some(data) => Some(
            base64::engine::general_purpose::STANDARD
                .decode(data.as_bytes())
                .map_err(|e| VoiceError::MalformedEvent(format!("invalid base64 audio: {}", e)))?,
        ),
        None => None,
    };

    Ok(SynthesisEvent {
        audio,
        finished: raw.output.finish_reason.as_deref() == Some(FINISH_STOP),
        url: raw.output.audio.url.filter(|url| !url.is_empty()),
        expires_at: raw.output.audio.expires_at,
    })
}

/// Client for DashScope's streaming multimodal-generation TTS endpoint.
#[derive(Debug, Clone)]
pub struct DashScopeSynthesizer {
    http: reqwest::Client,
    config: SynthesisConfig,
}

impl DashScopeSynthesizer {
    pub fn new(config: SynthesisConfig) -> Result<Self, VoiceError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl SpeechSynthesizer for DashScopeSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesisStream, VoiceError> {
        if text.len() > MAX_TTS_INPUT_BYTES {
            return Err(VoiceError::Tts(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_TTS_INPUT_BYTES
            )));
        }

        let body = json!({
            "model": self.config.model,
            "input": {
                "text": text,
                "voice": voice,
            },
        });

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .header("X-DashScope-SSE", "enable")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VoiceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let events = sse::data_payloads(Box::pin(response.bytes_stream())).filter_map(
            |item| async move {
                match item {
                    Ok(payload) => match parse_event(&payload) {
                        Ok(event) => Some(Ok(event)),
                        Err(e) => {
                            tracing::warn!("skipping synthesis event: {}", e);
                            None
                        }
                    },
                    Err(e) => Some(Err(VoiceError::Http(e))),
                }
            },
        );

        Ok(Box::pin(events))
    }
}
