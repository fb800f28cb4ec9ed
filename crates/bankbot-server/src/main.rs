use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{error, info};

use bankbot_server::app::build_state;
use bankbot_server::config::Settings;
use bankbot_server::handlers::build_router;
use bankbot_server::utils::error::ChatError;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,bankbot_server=debug".to_string()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .init();

    info!("Starting bankbot server...");

    let settings = Settings::load(None).map_err(|e| abort_startup(e.into()))?;
    info!("Configuration loaded");

    let state = build_state(&settings).await.map_err(abort_startup)?;
    info!(
        "Chat pipeline ready (similarity threshold {})",
        state.orchestrator.cache().threshold()
    );

    // Background sweep of idle sessions
    let sessions = state.sessions.clone();
    let interval_secs = settings.session.cleanup_interval_secs.max(1);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            sessions.cleanup_expired();
        }
    });

    let app = build_router(state);

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Log why startup failed and hand the error back for `main` to return.
fn abort_startup(e: anyhow::Error) -> anyhow::Error {
    match e.downcast_ref::<ChatError>() {
        Some(chat_err) if chat_err.is_fatal() => {
            error!("Fatal configuration error, refusing to serve: {}", chat_err)
        }
        _ => error!("Startup aborted: {:#}", e),
    }
    e
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
