//! API route configuration.

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers;
use crate::state::AppState;

/// Creates the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))

        // Index protocol
        .route("/synced", get(handlers::synced))
        .route("/height", get(handlers::height))
        .route("/host/:pubkey", get(handlers::host))

        .with_state(state)
}
