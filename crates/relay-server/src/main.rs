//! Scoreboard relay server — HTTP publish endpoints + WebSocket broadcast.
//!
//! Optional env: HOST, PORT, PUBLISH_API_KEY, REPLAY_LAST_KNOWN,
//! REPLAY_MAX_TEAMS, BROADCAST_CAPACITY, WS_PING_INTERVAL_SECS

use std::sync::Arc;

use relay_server::{api, config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;
    let config = Arc::new(config);

    let state = api::AppState::new(config.clone());
    let app = api::router(state.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    state.start_relay()?;
    tracing::info!(
        replay_last_known = config.replay_last_known,
        auth = config.publish_api_key.is_some(),
        "Relay listening on {}",
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
