//! HTTP dashboard and inbound webhook.
//!
//! All dashboard routes report read-only snapshots of the store; nothing
//! here mutates conversation state. The webhook route is the inbound edge
//! of the transport: it parses bridge payloads into [`InboundEvent`]s and
//! queues them for the engine.

use crate::backend::AudioPayload;
use crate::config::DashboardConfig;
use crate::error::{BotError, Result};
use crate::router::EngineEvent;
use crate::store::{ConversationId, Store};
use crate::transport::InboundEvent;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::info;

#[derive(Clone)]
struct DashboardState {
    store: Arc<Mutex<Store>>,
    events_tx: mpsc::Sender<EngineEvent>,
}

/// Inbound webhook payload from the transport bridge.
#[derive(serde::Deserialize)]
struct InboundBody {
    from: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    is_group: bool,
    #[serde(default)]
    is_self: bool,
    /// Base64-encoded voice message, if any.
    #[serde(default)]
    audio: Option<String>,
    #[serde(default)]
    mime: Option<String>,
}

/// Serve the dashboard until the process exits.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(
    config: DashboardConfig,
    store: Arc<Mutex<Store>>,
    events_tx: mpsc::Sender<EngineEvent>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BotError::Config(format!("dashboard bind {addr} failed: {e}")))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| BotError::Config(format!("dashboard local_addr failed: {e}")))?;

    info!("dashboard listening on http://{local_addr}");
    axum::serve(listener, router(store, events_tx))
        .await
        .map_err(|e| BotError::Config(format!("dashboard server failed: {e}")))?;
    Ok(())
}

/// Build the dashboard router (separated for tests).
#[must_use]
pub fn router(store: Arc<Mutex<Store>>, events_tx: mpsc::Sender<EngineEvent>) -> Router {
    let state = DashboardState { store, events_tx };
    Router::new()
        .route("/", get(status))
        .route("/ping", get(ping))
        .route("/health", get(health))
        .route("/chats", get(chats))
        .route("/event", post(inbound_event))
        .with_state(state)
}

fn lock_store(store: &Arc<Mutex<Store>>) -> std::sync::MutexGuard<'_, Store> {
    match store.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

async fn status(State(state): State<DashboardState>) -> impl IntoResponse {
    let snapshot = lock_store(&state.store).dashboard_snapshot();
    let uptime_secs = (Utc::now() - snapshot.stats.started_at).num_seconds().max(0) as u64;

    Json(serde_json::json!({
        "status": "coro is running",
        "uptime": format_uptime(uptime_secs),
        "stats": snapshot.stats,
        "endpoints": {
            "/": "status and stats",
            "/ping": "health check",
            "/health": "detailed status",
            "/chats": "per-conversation summaries",
        },
    }))
}

async fn ping(State(state): State<DashboardState>) -> impl IntoResponse {
    let started_at = lock_store(&state.store).stats.started_at;
    let uptime_secs = (Utc::now() - started_at).num_seconds().max(0);
    Json(serde_json::json!({
        "status": "pong",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime_secs": uptime_secs,
    }))
}

async fn health(State(state): State<DashboardState>) -> impl IntoResponse {
    let stats = lock_store(&state.store).stats.clone();
    Json(serde_json::json!({
        "transport": stats.connection_status,
        "authenticated": stats.is_authenticated,
        "server": "online",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn chats(State(state): State<DashboardState>) -> impl IntoResponse {
    let snapshot = lock_store(&state.store).dashboard_snapshot();
    Json(serde_json::json!({
        "conversations": snapshot.conversations,
    }))
}

async fn inbound_event(
    State(state): State<DashboardState>,
    Json(body): Json<InboundBody>,
) -> impl IntoResponse {
    let event = match parse_inbound(body) {
        Ok(event) => event,
        Err(message) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": message })),
            );
        }
    };

    if state
        .events_tx
        .send(EngineEvent::Inbound(event))
        .await
        .is_err()
    {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "engine unavailable" })),
        );
    }

    (StatusCode::OK, Json(serde_json::json!({ "queued": true })))
}

fn parse_inbound(body: InboundBody) -> std::result::Result<InboundEvent, String> {
    let from = body.from.trim();
    if from.is_empty() {
        return Err("from is required".to_owned());
    }

    let audio = match body.audio {
        Some(encoded) => {
            let data = BASE64
                .decode(encoded.trim())
                .map_err(|_| "audio is not valid base64".to_owned())?;
            Some(AudioPayload {
                data,
                mime: body.mime.unwrap_or_else(|| "audio/ogg".to_owned()),
            })
        }
        None => None,
    };

    Ok(InboundEvent {
        id: uuid::Uuid::new_v4().to_string(),
        from: ConversationId::from(from),
        body: body.body,
        is_group: body.is_group,
        is_self: body.is_self,
        audio,
    })
}

/// `Xh Ym Zs` uptime format.
fn format_uptime(secs: u64) -> String {
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}
