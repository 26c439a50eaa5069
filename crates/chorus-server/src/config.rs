//! Server configuration loading from file and environment variables.

use chorus_chat::ChatConfig;
use chorus_voice::SynthesisConfig;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Generation backend.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Speech-synthesis backend.
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Session lifecycle and pipeline tuning.
    #[serde(default)]
    pub sessions: SessionsConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "chorus_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionsConfig {
    /// Session IDs created and registered at startup.
    #[serde(default = "default_preload")]
    pub preload: Vec<String>,

    /// Capacity of each session's pending-chunk queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Segment length, in characters, above which a segment flush fires.
    #[serde(default = "default_segment_threshold")]
    pub segment_threshold: usize,

    /// Detached sessions idle for longer than this are removed. `0` keeps
    /// sessions for the life of the process.
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_preload() -> Vec<String> {
    vec!["sess1".to_string(), "sess2".to_string()]
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_segment_threshold() -> usize {
    100
}

fn default_idle_ttl_secs() -> u64 {
    3600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            preload: default_preload(),
            queue_capacity: default_queue_capacity(),
            segment_threshold: default_segment_threshold(),
            idle_ttl_secs: default_idle_ttl_secs(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `OPENAI_API_KEY`, `OPENAI_API_BASE`, `OPENAI_API_MODEL` override `chat.*`
/// - `DASHSCOPE_API_KEY` overrides `synthesis.api_key`
/// - `CHORUS_HOST` / `CHORUS_PORT` override `server.host` / `server.port`
/// - `CHORUS_LOG_LEVEL` overrides `logging.level`
/// - `CHORUS_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// Credentials are not checked here; a missing one surfaces when a session
/// is created.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Applies overrides from `lookup`, which maps a variable name to its value.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(key) = lookup("OPENAI_API_KEY") {
        config.chat.api_key = key;
    }
    if let Some(base) = lookup("OPENAI_API_BASE") {
        config.chat.base_url = base;
    }
    if let Some(model) = lookup("OPENAI_API_MODEL") {
        config.chat.model = model;
    }
    if let Some(key) = lookup("DASHSCOPE_API_KEY") {
        config.synthesis.api_key = key;
    }
    if let Some(host) = lookup("CHORUS_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = lookup("CHORUS_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(level) = lookup("CHORUS_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("CHORUS_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}
