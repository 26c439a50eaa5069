//! Shared HTTP plumbing: error responses and session resolution.

use crate::error::RelayError;
use crate::session::Session;
use crate::AppState;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// Query string carried by every session-scoped endpoint.
#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub sessionid: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::Busy { .. } | RelayError::DoubleCancellation(_) => {
                ApiError::Conflict(e.to_string())
            }
            _ => ApiError::InternalServerError(e.to_string()),
        }
    }
}

/// Looks up the session named by `?sessionid=`.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] when the parameter is missing or names
/// no registered session.
pub fn resolve_session(state: &AppState, query: &SessionQuery) -> Result<Arc<Session>, ApiError> {
    let id = query
        .sessionid
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing sessionid parameter".to_string()))?;

    state
        .registry
        .lookup(id)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid sessionid: {}", id)))
}
