use chorus_server::{
    app, background,
    config::{self, Config},
    registry::{ConfiguredBackends, SessionRegistry},
    session::SessionOptions,
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("CHORUS_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn build_registry(config: &Config) -> SessionRegistry {
    let provider = ConfiguredBackends::new(config.chat.clone(), config.synthesis.clone());
    let options = SessionOptions {
        queue_capacity: config.sessions.queue_capacity,
        segment_threshold: config.sessions.segment_threshold,
        voice: config.synthesis.voice.clone(),
    };
    SessionRegistry::new(Arc::new(provider), options)
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration, the server cannot start without valid config");

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );
    tracing::debug!(chat = ?config.chat, synthesis = ?config.synthesis, "upstream configuration");

    let registry = build_registry(&config);
    for session_id in &config.sessions.preload {
        registry
            .create(session_id.as_str())
            .expect("failed to create preloaded session, check [chat] and [synthesis] credentials");
    }
    tracing::info!(count = registry.len(), "preloaded sessions");

    tokio::spawn(background::start_expiry_task(
        registry.clone(),
        config.sessions.idle_ttl_secs,
    ));

    let app = app(AppState { registry });
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting chorus relay");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address, is another process using this port?");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");

    tracing::info!("chorus relay shut down");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
