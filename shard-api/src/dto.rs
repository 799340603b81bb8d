//! JSON response bodies.

use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status
    pub status: String,
    /// Version
    pub version: String,
    /// Blocks processed
    pub height: u64,
    /// Whether the chain observer is caught up
    pub synced: bool,
    /// Uptime in seconds
    pub uptime_seconds: u64,
}
