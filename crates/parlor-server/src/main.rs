mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use parlor_api::state::{AppState, AppStateInner};
use parlor_assistant::Assistant;
use parlor_gateway::dispatcher::Dispatcher;

use crate::config::Config;

/// Upper bound on waiting for in-flight assistant replies at shutdown.
const REPLY_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parlor=debug,parlor_api=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if !config.database_url_set {
        warn!("PARLOR_DATABASE_URL not set, using {}", config.db_path.display());
    }

    let db = parlor_db::Database::open(&config.db_path)?;
    let assistant = Assistant::new(config.assistant())?;
    info!(
        "Assistant provider: {} (model {})",
        assistant.config().provider.display_name(),
        assistant.config().model
    );

    let replies = TaskTracker::new();
    let state: AppState = Arc::new(AppStateInner {
        db,
        dispatcher: Dispatcher::new(),
        assistant,
        env: config.environment(),
        replies: replies.clone(),
    });

    let app = parlor_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Parlor server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    replies.close();
    if !replies.is_empty() {
        info!("Waiting for {} assistant replies to finish...", replies.len());
    }
    if tokio::time::timeout(REPLY_DRAIN_TIMEOUT, replies.wait()).await.is_err() {
        warn!("Gave up on {} assistant replies after {:?}", replies.len(), REPLY_DRAIN_TIMEOUT);
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
