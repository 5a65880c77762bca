use anyhow::Context;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use movie_ticket_system::{
    config::{Config, LogFormat},
    controllers, AppState,
};

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::new(&config.app.rust_log);
    let registry = tracing_subscriber::registry().with(filter);
    match config.app.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(&config);

    info!("Starting Movie Ticket System ({})", config.app.environment);

    let (app_state, db) = AppState::from_config(&config)
        .await
        .context("failed to initialise application state")?;

    // --- Background tasks ---
    let cleanup = app_state.sessions.spawn_cleanup(
        Duration::from_secs(config.sessions.cleanup_interval_seconds),
        Duration::from_secs(config.sessions.idle_timeout_seconds),
    );

    // --- Web server ---
    let app = controllers::app(app_state.clone());
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    cleanup.abort();
    if let Some(db) = db {
        db.close().await;
    }
    info!("Stopped");
    Ok(())
}
