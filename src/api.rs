//! HTTP API handlers (C6): the read-only external boundary over the signal
//! store and adapter manager.
//!
//! Grounded on `lumehaven/api/routes.py`'s handler shapes (`health_check`,
//! `metrics`, `list_signals`, `get_signal`, the SSE `stream_events`), kept in
//! the teacher's `#[instrument(skip(state))]` + `Result<Json<T>, StatusCode>`
//! style.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{http::StatusCode, Json};
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::manager::AdapterManager;
use crate::signal::Signal;
use crate::store::{SignalStore, StoreMetrics};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SignalStore>,
    pub manager: Arc<AdapterManager>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub signal_count: usize,
    pub subscriber_count: usize,
    pub adapters: Vec<crate::manager::AdapterStatus>,
}

/// `GET /health` — aggregates store and manager state into a single
/// healthy/degraded verdict. `healthy` iff there's at least one stored
/// signal, at least one registered adapter, and every adapter connected.
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let metrics = state.store.metrics().await;
    let subscriber_count = state.store.subscriber_count().await;
    let adapters = state.manager.adapter_statuses().await;

    let signal_count = metrics.signals.stored;
    let has_adapters = !adapters.is_empty();
    let all_connected = has_adapters && adapters.iter().all(|a| a.connected);
    let status = if signal_count > 0 && all_connected {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        signal_count,
        subscriber_count,
        adapters,
    })
}

/// `GET /metrics` — a JSON projection of the store's internal metrics.
#[instrument(skip(state))]
pub async fn metrics(State(state): State<AppState>) -> Json<StoreMetrics> {
    Json(state.store.metrics().await)
}

#[derive(Debug, Serialize)]
pub struct SignalsResponse {
    pub signals: Vec<Signal>,
    pub count: usize,
}

/// `GET /api/signals` — the full current snapshot.
#[instrument(skip(state))]
pub async fn list_signals(State(state): State<AppState>) -> Json<SignalsResponse> {
    let signals: Vec<Signal> = state.store.get_all().await.into_values().collect();
    let count = signals.len();
    Json(SignalsResponse { signals, count })
}

#[derive(Debug, Serialize)]
pub struct NotFoundResponse {
    pub detail: String,
}

/// `GET /api/signals/{id}` — a single signal, or 404 if unknown.
#[instrument(skip(state))]
pub async fn get_signal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Signal>, (StatusCode, Json<NotFoundResponse>)> {
    match state.store.get(&id).await {
        Some(signal) => Ok(Json(signal)),
        None => {
            warn!(signal_id = %id, "signal not found");
            Err((
                StatusCode::NOT_FOUND,
                Json(NotFoundResponse {
                    detail: format!("Signal not found: {id}"),
                }),
            ))
        }
    }
}

/// `GET /api/events/signals` — every subsequent signal update, as SSE.
/// Dropping the client connection releases the subscription (see
/// `SignalStore::subscribe`'s `Drop` impl).
#[instrument(skip(state))]
pub async fn stream_signals(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.store.subscribe().await;
    let events = subscription.map(|signal| {
        let data = serde_json::to_string(&signal).unwrap_or_default();
        Ok(Event::default().event("signal").data(data))
    });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

