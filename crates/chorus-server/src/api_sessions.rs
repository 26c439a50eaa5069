//! Session lifecycle endpoints.

use crate::api::{resolve_session, ApiError, SessionQuery};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Extension, Query},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// Handler for `POST /api/sessions`.
///
/// The body is optional; without a `sessionId` a random one is assigned.
pub async fn create_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let request: CreateSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {}", e)))?
    };

    let session_id = match request.session_id {
        Some(id) if id.trim().is_empty() => {
            return Err(ApiError::BadRequest("sessionId must not be empty".to_string()))
        }
        Some(id) => id,
        None => Uuid::new_v4().to_string(),
    };

    let session = state.registry.create(session_id).inspect_err(|e| {
        tracing::error!("failed to create session: {}", e);
    })?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id().to_string(),
        }),
    ))
}

/// Handler for `GET|POST /ws/stop-audio-stream?sessionid=`.
pub async fn stop_audio_stream_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<SessionQuery>,
) -> Result<&'static str, ApiError> {
    let session = resolve_session(&state, &params)?;
    session.cancel_audio()?;
    Ok("audio stream stopped")
}
