//! API route handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use tracing::debug;

use shard_core::types::HostPublicKey;

use crate::dto::HealthResponse;
use crate::error::ApiError;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

/// GET /synced
pub async fn synced(State(state): State<Arc<AppState>>) -> String {
    state.reader.synced().to_string()
}

/// GET /height
pub async fn height(State(state): State<Arc<AppState>>) -> String {
    state.reader.height().to_string()
}

/// GET /host/:pubkey
///
/// Returns the stored `announcement || signature` bytes untouched; clients
/// verify them.
pub async fn host(
    State(state): State<Arc<AppState>>,
    Path(pubkey): Path<String>,
) -> Result<impl IntoResponse> {
    let key: HostPublicKey = pubkey.parse()?;

    match state.reader.announcement_for(&key).await? {
        Some(record) => Ok((
            [(header::CONTENT_TYPE, "application/octet-stream")],
            record.to_bytes(),
        )),
        None => {
            debug!(host = %key, "No record of host");
            Err(ApiError::not_found())
        }
    }
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let index = state.reader.state();

    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        height: index.height,
        synced: index.synced,
        uptime_seconds: state.started.elapsed().as_secs(),
    })
}
