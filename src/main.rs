//! Bot entry point: config, dashboard, eviction sweep, and the engine loop.

use coro::backend::HttpBackend;
use coro::config::BotConfig;
use coro::router::{Engine, EngineEvent};
use coro::transport::WebhookTransport;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => BotConfig::load(&path)?,
        None => BotConfig::from_env(),
    };

    tracing::info!(
        "coro starting (backend: {}, model: {})",
        config.backend.api_url,
        config.backend.api_model
    );

    let backend = Arc::new(HttpBackend::new(&config.backend));
    let transport = Arc::new(WebhookTransport::new(&config.transport));
    let engine = Engine::new(config.clone(), backend, transport);
    let store = engine.store();

    let (events_tx, events_rx) = mpsc::channel::<EngineEvent>(128);

    if config.dashboard.enabled {
        let dashboard_store = Arc::clone(&store);
        let dashboard_config = config.dashboard.clone();
        let dashboard_tx = events_tx.clone();
        tokio::spawn(async move {
            if let Err(err) =
                coro::dashboard::serve(dashboard_config, dashboard_store, dashboard_tx).await
            {
                tracing::error!("dashboard stopped: {err}");
            }
        });
    }

    // Idle-conversation eviction runs off the request path.
    let sweep_store = Arc::clone(&store);
    let idle_ttl = Duration::from_secs(config.chat.idle_ttl_secs);
    let sweep_interval = Duration::from_secs(config.chat.sweep_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Ok(mut store) = sweep_store.lock() {
                store.sweep_idle(idle_ttl);
            }
        }
    });

    engine.run(events_rx).await;

    tracing::info!("coro shut down");
    Ok(())
}
