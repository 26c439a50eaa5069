//! WebSocket upgrade handlers for the two halves of a session.
//!
//! The half is leased before the upgrade is accepted, so a second client
//! for the same half gets a 409 instead of a socket.

use crate::api::{resolve_session, ApiError, SessionQuery};
use crate::{audio_stream, text_stream, AppState};
use axum::{
    extract::{ConnectInfo, Extension, Query, WebSocketUpgrade},
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;

/// Handler for `GET /ws/text-stream?sessionid=`.
pub async fn text_stream_handler(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
    Query(params): Query<SessionQuery>,
) -> Result<Response, ApiError> {
    let session = resolve_session(&state, &params)?;
    let lease = session.claim_text().inspect_err(|e| {
        tracing::warn!(remote_addr = %addr, session_id = %session.id(), "{}", e);
    })?;
    session.touch();

    tracing::info!(remote_addr = %addr, session_id = %session.id(), "text stream attached");
    Ok(ws.on_upgrade(move |socket| text_stream::run_text_stream(socket, session, lease)))
}

/// Handler for `GET /ws/audio-stream?sessionid=`.
pub async fn audio_stream_handler(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
    Query(params): Query<SessionQuery>,
) -> Result<Response, ApiError> {
    let session = resolve_session(&state, &params)?;
    let lease = session.claim_audio().inspect_err(|e| {
        tracing::warn!(remote_addr = %addr, session_id = %session.id(), "{}", e);
    })?;
    session.touch();

    tracing::info!(remote_addr = %addr, session_id = %session.id(), "audio stream attached");
    Ok(ws.on_upgrade(move |socket| audio_stream::run_audio_stream(socket, session, lease)))
}
