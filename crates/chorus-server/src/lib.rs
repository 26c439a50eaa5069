//! Chorus relay server.
//!
//! Pairs a text WebSocket and an audio WebSocket per session: text typed by
//! the user is answered by a streaming generation backend, and the answer
//! is simultaneously spoken through a streaming synthesis backend.

pub mod api;
pub mod api_sessions;
pub mod api_ws;
pub mod audio_stream;
pub mod background;
pub mod config;
pub mod error;
pub mod registry;
pub mod segmenter;
pub mod session;
pub mod text_stream;

use axum::{
    extract::Extension,
    routing::{get, post},
    Json, Router,
};
use registry::SessionRegistry;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub use error::RelayError;

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
}

async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.registry.len(),
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", post(api_sessions::create_session_handler))
        .route("/ws/text-stream", get(api_ws::text_stream_handler))
        .route("/ws/audio-stream", get(api_ws::audio_stream_handler))
        .route(
            "/ws/stop-audio-stream",
            get(api_sessions::stop_audio_stream_handler)
                .post(api_sessions::stop_audio_stream_handler),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
