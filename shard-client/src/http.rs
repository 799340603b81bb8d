//! Shared HTTP plumbing.

use std::time::Duration;

use shard_core::error::{Result, ShardError};

/// Builds a pooled HTTP client with a per-request deadline.
pub(crate) fn build_client(timeout: Duration, user_agent: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(user_agent) = user_agent {
        builder = builder.user_agent(user_agent);
    }
    builder
        .build()
        .map_err(|e| ShardError::ConfigError(format!("failed to create HTTP client: {}", e)))
}

/// Maps a request failure onto the transport error kinds.
pub(crate) fn transport_error(err: reqwest::Error) -> ShardError {
    if err.is_timeout() {
        ShardError::Timeout(err.to_string())
    } else {
        ShardError::Transport(err.to_string())
    }
}

/// Reads the whole body, failing once it grows past `limit` bytes.
///
/// The declared length is checked first so an oversized body is usually
/// refused before any of it is read.
pub(crate) async fn read_limited(mut response: reqwest::Response, limit: usize) -> Result<Vec<u8>> {
    let too_large = || ShardError::Protocol(format!("response body exceeds {} bytes", limit));

    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(too_large());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(transport_error)? {
        if body.len() + chunk.len() > limit {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Reads at most `limit` bytes of the body as lossy UTF-8 and drops the rest.
pub(crate) async fn read_truncated(mut response: reqwest::Response, limit: usize) -> String {
    let mut body = Vec::new();
    while body.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(limit - body.len());
                body.extend_from_slice(&chunk[..take]);
            }
            _ => break,
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
