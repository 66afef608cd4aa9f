// Public API for integration tests and potential library usage

pub mod api;
pub mod catalog;
pub mod config;
pub mod protocol;
pub mod state;
pub mod storage;
pub mod types;
pub mod ws;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::GameEngine;

/// Routes for the WebSocket and the JSON API
pub fn build_router(engine: Arc<GameEngine>) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/state", get(api::get_state))
        .route("/api/history", get(api::get_history))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}
