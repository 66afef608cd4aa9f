//! HTTP API endpoints.
//!
//! Read-only views of the engine for clients that do not hold a WebSocket.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::state::{EngineSnapshot, GameEngine};
use crate::types::HistoryEntry;

/// Current engine snapshot.
///
/// GET /api/state
pub async fn get_state(State(engine): State<Arc<GameEngine>>) -> Json<EngineSnapshot> {
    Json(engine.snapshot().await)
}

/// Played rounds, newest first.
///
/// GET /api/history
pub async fn get_history(State(engine): State<Arc<GameEngine>>) -> Json<Vec<HistoryEntry>> {
    Json(engine.history().await)
}
