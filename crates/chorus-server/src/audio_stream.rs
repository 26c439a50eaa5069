//! Audio-side driver: drains the session queue into speech.

use crate::error::RelayError;
use crate::segmenter::{Flush, Segmenter};
use crate::session::{AudioLease, Session};
use axum::extract::ws::{Message, WebSocket};
use chorus_types::AudioNotice;
use chorus_voice::normalize;
use futures_util::{Sink, SinkExt, StreamExt};
use std::fmt::Display;
use std::sync::Arc;

async fn send<S>(sink: &mut S, message: Message) -> Result<(), RelayError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    sink.send(message)
        .await
        .map_err(|e| RelayError::Connection(e.to_string()))
}

/// Synthesizes one flush and writes its output to `sink`.
///
/// Segment flushes forward each audio payload as a binary frame; whole-turn
/// flushes forward only the completion notice. Text that normalizes to
/// nothing speakable is skipped without calling the synthesizer.
pub async fn forward_synthesis<S>(
    session: &Session,
    flush: &Flush,
    sink: &mut S,
) -> Result<(), RelayError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let text = normalize(&flush.text);
    if text.trim().is_empty() {
        tracing::debug!(
            session_id = %session.id(),
            turn_id = %flush.turn_id,
            kind = flush.kind.as_str(),
            "nothing speakable, skipping synthesis"
        );
        return Ok(());
    }

    let mut events = session.synthesizer().synthesize(&text, session.voice()).await?;
    let mut frames = 0usize;
    while let Some(event) = events.next().await {
        let event = event?;

        if flush.kind.is_segment() {
            if let Some(audio) = event.audio.filter(|audio| !audio.is_empty()) {
                send(sink, Message::Binary(audio.into())).await?;
                frames += 1;
            }
        }

        if event.finished {
            if let Some(url) = event.url {
                let notice = AudioNotice {
                    message_id: flush.turn_id.clone(),
                    audio_url: url,
                    is_segment: flush.kind.is_segment(),
                };
                send(sink, Message::Text(serde_json::to_string(&notice)?.into())).await?;
            }
        }
    }

    tracing::debug!(
        session_id = %session.id(),
        turn_id = %flush.turn_id,
        kind = flush.kind.as_str(),
        frames,
        "synthesis forwarded"
    );
    Ok(())
}

enum FlushOutcome {
    Delivered,
    Cancelled,
    Failed(RelayError),
}

/// Runs a flush unless the session is cancelled first or meanwhile.
async fn flush_or_cancel<S>(session: &Session, flush: &Flush, sink: &mut S) -> FlushOutcome
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    tokio::select! {
        biased;
        () = session.audio_cancelled() => FlushOutcome::Cancelled,
        result = forward_synthesis(session, flush, sink) => match result {
            Ok(()) => FlushOutcome::Delivered,
            Err(e) => FlushOutcome::Failed(e),
        },
    }
}

/// Serves one audio connection until it is cancelled or the client leaves.
///
/// Chunks left in the queue when the driver stops stay there for the next
/// audio connection.
pub async fn run_audio_stream(socket: WebSocket, session: Arc<Session>, mut lease: AudioLease) {
    let (mut sink, mut inbound) = socket.split();
    let mut segmenter = Segmenter::new(session.segment_threshold());

    'relay: loop {
        tokio::select! {
            biased;
            () = session.audio_cancelled() => {
                tracing::info!(session_id = %session.id(), "audio stream stopped by request");
                break 'relay;
            }
            frame = inbound.next() => match frame {
                None | Some(Ok(Message::Close(_))) => {
                    tracing::info!(session_id = %session.id(), "audio client disconnected");
                    break 'relay;
                }
                Some(Err(e)) => {
                    tracing::warn!(session_id = %session.id(), "audio read failed: {}", e);
                    break 'relay;
                }
                Some(Ok(_)) => {}
            },
            chunk = lease.chunks.recv() => {
                let Some(chunk) = chunk else {
                    break 'relay;
                };
                session.touch();

                for flush in segmenter.push(&chunk) {
                    match flush_or_cancel(&session, &flush, &mut sink).await {
                        FlushOutcome::Delivered => {}
                        FlushOutcome::Cancelled => {
                            tracing::info!(
                                session_id = %session.id(),
                                turn_id = %flush.turn_id,
                                "audio stream stopped during synthesis"
                            );
                            break 'relay;
                        }
                        FlushOutcome::Failed(RelayError::Connection(e)) => {
                            tracing::warn!(session_id = %session.id(), "audio write failed: {}", e);
                            break 'relay;
                        }
                        FlushOutcome::Failed(e) => {
                            tracing::warn!(
                                session_id = %session.id(),
                                turn_id = %flush.turn_id,
                                kind = flush.kind.as_str(),
                                "synthesis failed: {}",
                                e
                            );
                        }
                    }
                }
            }
        }
    }

    tracing::info!(session_id = %session.id(), "audio stream detached");
}
