//! Per-session state shared by the text and audio drivers.
//!
//! A session owns a conversational history, a bounded queue of pending text
//! chunks and a one-shot cancellation signal for its audio pipeline. The
//! text driver exclusively owns the history and the queue's sending side;
//! the audio driver exclusively owns the receiving side. Each half is
//! handed out as a lease that is released when its connection ends.

use crate::error::RelayError;
use chorus_chat::ChatBackend;
use chorus_types::{ChatMessage, TextChunk};
use chorus_voice::SpeechSynthesizer;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, OwnedMutexGuard};
use tokio::time::Instant;

/// Tuning shared by every session created by one registry.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub queue_capacity: usize,
    /// Segment length, in characters, above which a segment flush fires.
    pub segment_threshold: usize,
    /// Voice requested from the synthesizer.
    pub voice: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            segment_threshold: 100,
            voice: "Chelsie".to_string(),
        }
    }
}

/// The upstream services a session talks to.
#[derive(Clone)]
pub struct Backends {
    pub chat: Arc<dyn ChatBackend>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

/// State owned by the text driver while its connection is open.
#[derive(Debug)]
pub struct TextHalf {
    pub(crate) history: Vec<ChatMessage>,
    pub(crate) chunks: mpsc::Sender<TextChunk>,
}

impl TextHalf {
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Sending side of the pending-chunk queue.
    pub fn queue(&self) -> &mpsc::Sender<TextChunk> {
        &self.chunks
    }
}

/// State owned by the audio driver while its connection is open.
#[derive(Debug)]
pub struct AudioHalf {
    pub(crate) chunks: mpsc::Receiver<TextChunk>,
}

impl AudioHalf {
    /// Receiving side of the pending-chunk queue.
    pub fn queue(&mut self) -> &mut mpsc::Receiver<TextChunk> {
        &mut self.chunks
    }
}

pub type TextLease = OwnedMutexGuard<TextHalf>;
pub type AudioLease = OwnedMutexGuard<AudioHalf>;

/// One-shot flag that stays raised once raised.
#[derive(Debug)]
pub struct CancelSignal {
    tx: watch::Sender<bool>,
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Raises the signal. Returns `false` if it was already raised.
    pub fn raise(&self) -> bool {
        self.tx.send_if_modified(|raised| {
            if *raised {
                false
            } else {
                *raised = true;
                true
            }
        })
    }

    pub fn is_raised(&self) -> bool {
        *self.tx.borrow()
    }

    /// Completes once the signal is raised, immediately if it already is.
    pub async fn raised(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|raised| *raised).await;
    }
}

/// A server-side conversational context addressed by its ID.
pub struct Session {
    id: String,
    backends: Backends,
    options: SessionOptions,
    text: Arc<Mutex<TextHalf>>,
    audio: Arc<Mutex<AudioHalf>>,
    audio_cancel: CancelSignal,
    last_active: StdMutex<Instant>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("options", &self.options)
            .field("audio_cancelled", &self.audio_cancel.is_raised())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a session with an empty history, an empty queue and the
    /// cancellation signal lowered.
    pub fn new(id: impl Into<String>, backends: Backends, options: SessionOptions) -> Self {
        let (tx, rx) = mpsc::channel(options.queue_capacity.max(1));
        Self {
            id: id.into(),
            backends,
            options,
            text: Arc::new(Mutex::new(TextHalf {
                history: Vec::new(),
                chunks: tx,
            })),
            audio: Arc::new(Mutex::new(AudioHalf { chunks: rx })),
            audio_cancel: CancelSignal::new(),
            last_active: StdMutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn chat(&self) -> &dyn ChatBackend {
        self.backends.chat.as_ref()
    }

    pub fn synthesizer(&self) -> &dyn SpeechSynthesizer {
        self.backends.synthesizer.as_ref()
    }

    pub fn voice(&self) -> &str {
        &self.options.voice
    }

    pub fn segment_threshold(&self) -> usize {
        self.options.segment_threshold
    }

    /// Takes the text half for one connection.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Busy`] if another text connection holds it.
    pub fn claim_text(&self) -> Result<TextLease, RelayError> {
        self.text
            .clone()
            .try_lock_owned()
            .map_err(|_| RelayError::Busy {
                session_id: self.id.clone(),
                half: "text",
            })
    }

    /// Takes the audio half for one connection.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Busy`] if another audio connection holds it.
    pub fn claim_audio(&self) -> Result<AudioLease, RelayError> {
        self.audio
            .clone()
            .try_lock_owned()
            .map_err(|_| RelayError::Busy {
                session_id: self.id.clone(),
                half: "audio",
            })
    }

    /// Returns `true` while either half is leased to a connection.
    pub fn is_attached(&self) -> bool {
        self.text.try_lock().is_err() || self.audio.try_lock().is_err()
    }

    /// Snapshot of the history. Waits for the text half to be free.
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.text.lock().await.history.clone()
    }

    /// Stops the audio pipeline of this session for good.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::DoubleCancellation`] if it was already stopped.
    pub fn cancel_audio(&self) -> Result<(), RelayError> {
        if self.audio_cancel.raise() {
            tracing::info!(session_id = %self.id, "audio stream cancelled");
            Ok(())
        } else {
            Err(RelayError::DoubleCancellation(self.id.clone()))
        }
    }

    pub fn is_audio_cancelled(&self) -> bool {
        self.audio_cancel.is_raised()
    }

    /// Completes once the audio pipeline is cancelled.
    pub async fn audio_cancelled(&self) {
        self.audio_cancel.raised().await
    }

    /// Records activity for idle expiry.
    pub fn touch(&self) {
        let mut last = self
            .last_active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        let last = self
            .last_active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        last.elapsed()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use chorus_chat::{ChatError, DeltaStream};
    use chorus_voice::{SynthesisEvent, SynthesisStream, VoiceError};
    use futures_util::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies with the same deltas to every request.
    pub struct ScriptedChat {
        pub deltas: Vec<Result<String, String>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedChat {
        pub fn new(deltas: &[&str]) -> Self {
            Self {
                deltas: deltas.iter().map(|d| Ok(d.to_string())).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedChat {
        async fn stream_chat(&self, _history: &[ChatMessage]) -> Result<DeltaStream, ChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let items: Vec<Result<String, ChatError>> = self
                .deltas
                .iter()
                .map(|d| d.clone().map_err(ChatError::Parse))
                .collect();
            Ok(Box::pin(stream::iter(items)))
        }
    }

    /// Returns one audio event and one finished event per call and records
    /// the text it was asked to speak.
    #[derive(Default)]
    pub struct RecordingSynth {
        pub texts: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for RecordingSynth {
        async fn synthesize(&self, text: &str, _voice: &str) -> Result<SynthesisStream, VoiceError> {
            let call = {
                let mut texts = self.texts.lock().unwrap();
                texts.push(text.to_string());
                texts.len()
            };
            let events = vec![
                Ok(SynthesisEvent {
                    audio: Some(vec![call as u8]),
                    ..Default::default()
                }),
                Ok(SynthesisEvent {
                    finished: true,
                    url: Some(format!("http://audio.test/{}.wav", call)),
                    ..Default::default()
                }),
            ];
            Ok(Box::pin(stream::iter(events)))
        }
    }

    pub fn backends(chat: Arc<dyn ChatBackend>, synth: Arc<dyn SpeechSynthesizer>) -> Backends {
        Backends {
            chat,
            synthesizer: synth,
        }
    }

    pub fn session(id: &str, chat: &[&str]) -> (Session, Arc<RecordingSynth>) {
        let synth = Arc::new(RecordingSynth::default());
        let session = Session::new(
            id,
            backends(Arc::new(ScriptedChat::new(chat)), synth.clone()),
            SessionOptions::default(),
        );
        (session, synth)
    }
}
