//! Process-wide table of live sessions.

use crate::error::RelayError;
use crate::session::{Backends, Session, SessionOptions};
use chorus_chat::{ChatConfig, OpenAiChatClient};
use chorus_voice::{DashScopeSynthesizer, SynthesisConfig};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Supplies upstream clients for each newly created session.
pub trait BackendProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns [`RelayError::Configuration`] if a client cannot be built.
    fn backends(&self) -> Result<Backends, RelayError>;
}

/// Builds fresh HTTP clients from configuration for every session.
#[derive(Debug, Clone)]
pub struct ConfiguredBackends {
    chat: ChatConfig,
    synthesis: SynthesisConfig,
}

impl ConfiguredBackends {
    pub fn new(chat: ChatConfig, synthesis: SynthesisConfig) -> Self {
        Self { chat, synthesis }
    }
}

impl BackendProvider for ConfiguredBackends {
    fn backends(&self) -> Result<Backends, RelayError> {
        let chat = OpenAiChatClient::new(self.chat.clone())
            .map_err(|e| RelayError::Configuration(e.to_string()))?;
        let synthesizer = DashScopeSynthesizer::new(self.synthesis.clone())
            .map_err(|e| RelayError::Configuration(e.to_string()))?;
        Ok(Backends {
            chat: Arc::new(chat),
            synthesizer: Arc::new(synthesizer),
        })
    }
}

/// A fixed pair of clients shared by every session.
impl BackendProvider for Backends {
    fn backends(&self) -> Result<Backends, RelayError> {
        Ok(self.clone())
    }
}

/// Concurrent map from session ID to session.
///
/// Cloning is cheap; all clones share the same table.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
    provider: Arc<dyn BackendProvider>,
    options: SessionOptions,
}

impl SessionRegistry {
    pub fn new(provider: Arc<dyn BackendProvider>, options: SessionOptions) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            provider,
            options,
        }
    }

    /// Builds a session with fresh upstream clients and registers it.
    ///
    /// Nothing is registered when the clients cannot be built.
    pub fn create(&self, session_id: impl Into<String>) -> Result<Arc<Session>, RelayError> {
        let session_id = session_id.into();
        let backends = self.provider.backends()?;
        let session = Arc::new(Session::new(
            session_id.clone(),
            backends,
            self.options.clone(),
        ));
        self.register(session.clone());
        tracing::info!(session_id = %session_id, "session created");
        Ok(session)
    }

    /// Inserts `session`, replacing any session with the same ID.
    pub fn register(&self, session: Arc<Session>) {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if sessions
            .insert(session.id().to_string(), session.clone())
            .is_some()
        {
            tracing::warn!(session_id = %session.id(), "replaced existing session");
        }
    }

    pub fn lookup(&self, session_id: &str) -> Option<Arc<Session>> {
        let sessions = self
            .sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.get(session_id).cloned()
    }

    /// Drops the table's reference to a session. Connections still holding
    /// the session keep it alive until they end.
    pub fn remove(&self, session_id: &str) -> Option<Arc<Session>> {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.remove(session_id)
    }

    /// Removes every detached session idle for at least `ttl` and returns
    /// the removed IDs.
    pub fn prune_idle(&self, ttl: Duration) -> Vec<String> {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let expired: Vec<String> = sessions
            .values()
            .filter(|s| !s.is_attached() && s.idle_for() >= ttl)
            .map(|s| s.id().to_string())
            .collect();
        for id in &expired {
            sessions.remove(id);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
