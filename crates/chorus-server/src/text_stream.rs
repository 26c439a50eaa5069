//! Text-side driver: turns each inbound message into a generation turn.

use crate::error::RelayError;
use crate::session::{Session, TextHalf, TextLease};
use axum::extract::ws::{Message, WebSocket};
use chorus_types::{ChatMessage, TextChunk};
use futures_util::{Sink, SinkExt, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use uuid::Uuid;

/// Result of a turn that reached end-of-data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub turn_id: String,
    /// Content chunks forwarded, excluding the sentinel.
    pub chunks: usize,
}

async fn send_chunk<S>(sink: &mut S, chunk: &TextChunk) -> Result<(), RelayError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let json = serde_json::to_string(chunk)?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| RelayError::Connection(e.to_string()))
}

/// Hands a chunk to the audio pipeline unless it has been cancelled.
///
/// A send blocked on a full queue gives up as soon as the audio side is
/// cancelled.
async fn enqueue(session: &Session, half: &TextHalf, chunk: TextChunk) {
    tokio::select! {
        biased;
        () = session.audio_cancelled() => {
            tracing::trace!(session_id = %session.id(), "audio cancelled, chunk not queued");
        }
        result = half.chunks.send(chunk) => {
            if let Err(e) = result {
                tracing::warn!(session_id = %session.id(), "failed to queue chunk: {}", e);
            }
        }
    }
}

/// Runs one generation turn for `user_text`.
///
/// Every chunk goes to the audio queue before it is written to `sink`, and
/// every turn, finished or not, ends with a sentinel on the queue. The
/// assistant's answer joins the history only when the backend reaches
/// end-of-data.
///
/// # Errors
///
/// - [`RelayError::Upstream`] if the backend fails; the turn is abandoned
///   and the driver may continue.
/// - [`RelayError::Connection`] if writing to `sink` fails.
pub async fn relay_turn<S>(
    session: &Session,
    half: &mut TextHalf,
    sink: &mut S,
    user_text: String,
) -> Result<TurnOutcome, RelayError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    half.history.push(ChatMessage::user(user_text));
    let turn_id = Uuid::new_v4().to_string();
    tracing::debug!(session_id = %session.id(), turn_id = %turn_id, "turn started");

    let mut deltas = match session.chat().stream_chat(&half.history).await {
        Ok(deltas) => deltas,
        Err(e) => return abandon_turn(session, half, sink, &turn_id, e.into()).await,
    };

    let mut answer = String::new();
    let mut chunks = 0;
    while let Some(delta) = deltas.next().await {
        let delta = match delta {
            Ok(delta) => delta,
            Err(e) => return abandon_turn(session, half, sink, &turn_id, e.into()).await,
        };

        answer.push_str(&delta);
        let chunk = TextChunk::new(turn_id.as_str(), delta);
        enqueue(session, half, chunk.clone()).await;
        if let Err(e) = send_chunk(sink, &chunk).await {
            enqueue(session, half, TextChunk::sentinel(turn_id.as_str())).await;
            return Err(e);
        }
        chunks += 1;
    }

    half.history.push(ChatMessage::assistant(answer));

    let sentinel = TextChunk::sentinel(turn_id.as_str());
    enqueue(session, half, sentinel.clone()).await;
    send_chunk(sink, &sentinel).await?;

    Ok(TurnOutcome { turn_id, chunks })
}

/// Closes a failed turn with a sentinel on both outputs.
async fn abandon_turn<S>(
    session: &Session,
    half: &TextHalf,
    sink: &mut S,
    turn_id: &str,
    cause: RelayError,
) -> Result<TurnOutcome, RelayError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let sentinel = TextChunk::sentinel(turn_id);
    enqueue(session, half, sentinel.clone()).await;
    if let Err(e) = send_chunk(sink, &sentinel).await {
        tracing::warn!(session_id = %session.id(), turn_id, "turn failed: {}", cause);
        return Err(e);
    }
    Err(cause)
}

/// Serves one text connection until the client goes away.
pub async fn run_text_stream(socket: WebSocket, session: Arc<Session>, mut lease: TextLease) {
    let (mut sink, mut inbound) = socket.split();

    while let Some(frame) = inbound.next().await {
        let user_text = match frame {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    tracing::warn!(session_id = %session.id(), "ignoring non-UTF-8 message");
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(session_id = %session.id(), "text read failed: {}", e);
                break;
            }
        };

        session.touch();
        match relay_turn(&session, &mut lease, &mut sink, user_text).await {
            Ok(outcome) => tracing::info!(
                session_id = %session.id(),
                turn_id = %outcome.turn_id,
                chunks = outcome.chunks,
                "turn completed"
            ),
            Err(RelayError::Connection(e)) => {
                tracing::warn!(session_id = %session.id(), "text write failed: {}", e);
                break;
            }
            Err(e) => tracing::warn!(session_id = %session.id(), "turn abandoned: {}", e),
        }
        session.touch();
    }

    tracing::info!(session_id = %session.id(), "text stream detached");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_support::{backends, session, RecordingSynth, ScriptedChat};
    use crate::session::SessionOptions;
    use chorus_types::Role;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn sent_chunks(frames: &[Message]) -> Vec<TextChunk> {
        frames
            .iter()
            .map(|frame| match frame {
                Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
                other => panic!("unexpected frame {:?}", other),
            })
            .collect()
    }

    fn drain(half: &mut crate::session::AudioHalf) -> Vec<TextChunk> {
        let mut queued = Vec::new();
        while let Ok(chunk) = half.queue().try_recv() {
            queued.push(chunk);
        }
        queued
    }

    #[tokio::test]
    async fn turn_fans_out_to_client_and_queue() {
        let (session, _) = session("s", &["Hi", " there"]);
        let mut text = session.claim_text().unwrap();
        let mut audio = session.claim_audio().unwrap();
        let mut frames: Vec<Message> = Vec::new();

        let outcome = relay_turn(&session, &mut text, &mut frames, "hello".to_string())
            .await
            .unwrap();
        assert_eq!(outcome.chunks, 2);

        let sent = sent_chunks(&frames);
        let contents: Vec<&str> = sent.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["Hi", " there", "\n\n"]);
        assert!(sent.iter().all(|c| c.id == outcome.turn_id));

        let queued = drain(&mut audio);
        assert_eq!(queued, sent, "queue mirrors what the client saw");

        assert_eq!(
            text.history(),
            &[ChatMessage::user("hello"), ChatMessage::assistant("Hi there")]
        );
    }

    #[tokio::test]
    async fn turns_get_distinct_ids_and_full_history() {
        let (session, _) = session("s", &["ok"]);
        let mut text = session.claim_text().unwrap();
        let mut frames: Vec<Message> = Vec::new();

        let first = relay_turn(&session, &mut text, &mut frames, "one".into())
            .await
            .unwrap();
        let second = relay_turn(&session, &mut text, &mut frames, "two".into())
            .await
            .unwrap();

        assert_ne!(first.turn_id, second.turn_id);
        let roles: Vec<Role> = text.history().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
    }

    #[tokio::test]
    async fn upstream_failure_abandons_turn_with_sentinel() {
        let chat = ScriptedChat {
            deltas: vec![Ok("par".to_string()), Err("connection reset".to_string())],
            calls: AtomicUsize::new(0),
        };
        let session = Session::new(
            "s",
            backends(Arc::new(chat), Arc::new(RecordingSynth::default())),
            SessionOptions::default(),
        );
        let mut text = session.claim_text().unwrap();
        let mut audio = session.claim_audio().unwrap();
        let mut frames: Vec<Message> = Vec::new();

        let result = relay_turn(&session, &mut text, &mut frames, "q".into()).await;
        assert!(matches!(result, Err(RelayError::Upstream(_))));

        let sent = sent_chunks(&frames);
        assert_eq!(sent.len(), 2);
        assert!(sent[1].is_sentinel());
        assert_eq!(drain(&mut audio), sent);

        assert_eq!(text.history(), &[ChatMessage::user("q")]);
    }

    #[tokio::test]
    async fn cancelled_session_stops_queueing() {
        let (session, _) = session("s", &["a", "b"]);
        session.cancel_audio().unwrap();
        let mut text = session.claim_text().unwrap();
        let mut audio = session.claim_audio().unwrap();
        let mut frames: Vec<Message> = Vec::new();

        relay_turn(&session, &mut text, &mut frames, "q".into())
            .await
            .unwrap();

        assert_eq!(frames.len(), 3, "text client is unaffected");
        assert!(drain(&mut audio).is_empty());
    }

    #[tokio::test]
    async fn cancel_releases_turn_blocked_on_full_queue() {
        let session = Arc::new(Session::new(
            "s",
            backends(
                Arc::new(ScriptedChat::new(&["a", "b", "c"])),
                Arc::new(RecordingSynth::default()),
            ),
            SessionOptions {
                queue_capacity: 1,
                ..SessionOptions::default()
            },
        ));

        let turn = {
            let session = session.clone();
            tokio::spawn(async move {
                let mut text = session.claim_text().unwrap();
                let mut frames: Vec<Message> = Vec::new();
                let outcome = relay_turn(&session, &mut text, &mut frames, "q".into()).await;
                (outcome, frames.len())
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!turn.is_finished(), "second chunk waits for queue space");

        session.cancel_audio().unwrap();
        let (outcome, sent) = tokio::time::timeout(Duration::from_secs(2), turn)
            .await
            .expect("turn resumes once audio is cancelled")
            .unwrap();
        assert_eq!(outcome.unwrap().chunks, 3);
        assert_eq!(sent, 4);

        let mut audio = session.claim_audio().unwrap();
        let queued = drain(&mut audio);
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].content, "a");
    }
}
