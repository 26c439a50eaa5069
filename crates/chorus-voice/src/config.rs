use serde::Deserialize;
use std::fmt;

pub const DEFAULT_TTS_ENDPOINT: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/aigc/multimodal-generation/generation";

fn default_endpoint() -> String {
    DEFAULT_TTS_ENDPOINT.to_string()
}

fn default_model() -> String {
    "qwen-tts-latest".to_string()
}

fn default_voice() -> String {
    "Chelsie".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Settings for the speech-synthesis service.
#[derive(Clone, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Voice used for every call made by the relay.
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_endpoint(),
            model: default_model(),
            voice: default_voice(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl fmt::Debug for SynthesisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesisConfig")
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl SynthesisConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn validate(&self) -> Result<(), crate::VoiceError> {
        if self.api_key.trim().is_empty() {
            return Err(crate::VoiceError::Config(
                "missing synthesis.api_key".to_string(),
            ));
        }
        if self.endpoint.trim().is_empty() {
            return Err(crate::VoiceError::Config(
                "missing synthesis.endpoint".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(crate::VoiceError::Config(
                "missing synthesis.model".to_string(),
            ));
        }
        Ok(())
    }
}
