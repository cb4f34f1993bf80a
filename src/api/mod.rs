//! HTTP surface for UI observers.
//!
//! The popup-equivalent boundary: every route translates into one of
//! the cross-context control messages. The UI's only writes are the
//! toggle and reset commands; everything else is a read.

use crate::bus::ControlHandle;
use crate::logger::BlockEvent;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

struct ApiState {
    control: ControlHandle,
    events: Arc<RwLock<VecDeque<BlockEvent>>>,
}

pub async fn start_api_server(
    control: ControlHandle,
    events: Arc<RwLock<VecDeque<BlockEvent>>>,
    port: u16,
) {
    let state = Arc::new(ApiState { control, events });

    let app = Router::new()
        .route("/api/stats", get(get_stats))
        .route("/api/status", get(get_status))
        .route("/api/toggle", post(toggle))
        .route("/api/reset", post(reset_stats))
        .route("/api/events", get(get_events))
        .with_state(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("API server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn get_stats(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    match state.control.get_stats().await {
        Some(reply) => Json(reply).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn get_status(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    match state.control.get_stats().await {
        Some(reply) => Json(serde_json::json!({
            "enabled": reply.enabled,
            "last_updated": reply.last_updated,
        }))
        .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn toggle(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    match state.control.toggle().await {
        Some(ack) => Json(ack).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn reset_stats(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    match state.control.reset_stats().await {
        Some(ack) => Json(ack).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn get_events(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let buffer = state.events.read().unwrap();
    // Newest first
    let events: Vec<BlockEvent> = buffer.iter().rev().cloned().collect();
    Json(events)
}
