use serde::Deserialize;
use std::fmt;

fn default_request_timeout_secs() -> u64 {
    120
}

/// Connection settings for the generation backend.
#[derive(Clone, Deserialize)]
pub struct ChatConfig {
    /// Bearer credential for the backend.
    #[serde(default)]
    pub api_key: String,
    /// Base URL, e.g. `https://api.openai.com/v1`. `/chat/completions` is
    /// appended per request.
    #[serde(default)]
    pub base_url: String,
    /// Model identifier sent with every request.
    #[serde(default)]
    pub model: String,
    /// Upper bound on a whole streamed completion, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: String::new(),
            model: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl ChatConfig {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Checks that credential, endpoint and model are all present.
    pub fn validate(&self) -> Result<(), crate::ChatError> {
        let missing: Vec<&str> = [
            ("chat.api_key", &self.api_key),
            ("chat.base_url", &self.base_url),
            ("chat.model", &self.model),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(crate::ChatError::Config(format!(
                "missing {}",
                missing.join(", ")
            )))
        }
    }

    /// Full URL of the chat-completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_api_key() {
        let config = ChatConfig::new("sk-secret", "http://localhost", "m");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn validate_lists_every_missing_field() {
        let config = ChatConfig::new("", "http://localhost", " ");
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("chat.api_key"), "got: {}", err);
        assert!(err.contains("chat.model"), "got: {}", err);
        assert!(!err.contains("chat.base_url"), "got: {}", err);
    }

    #[test]
    fn completions_url_tolerates_trailing_slash() {
        let config = ChatConfig::new("k", "http://localhost:9/v1/", "m");
        assert_eq!(
            config.completions_url(),
            "http://localhost:9/v1/chat/completions"
        );
    }
}
