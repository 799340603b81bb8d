//! App state and server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use shard_core::constants::DEFAULT_API_ADDR;
use shard_core::error::{Result, ShardError};
use shard_core::traits::IndexReader;

/// Default store directory.
pub const DEFAULT_DATA_DIR: &str = "./shard-data";

/// Default number of journaled batches between snapshots.
pub const DEFAULT_COMPACT_THRESHOLD: u64 = 1000;

/// Index server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to listen on
    pub addr: SocketAddr,
    /// Store directory
    pub dir: PathBuf,
    /// Journaled batches between store snapshots
    pub compact_threshold: u64,
    /// Optional chain feed file to index from
    pub feed: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            dir: DEFAULT_DATA_DIR.into(),
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
            feed: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the environment, reading `.env` first if present.
    ///
    /// Recognizes `SHARD_API_ADDR`, `SHARD_DIR`, `SHARD_COMPACT_THRESHOLD` and
    /// `SHARD_FEED`.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let addr = std::env::var("SHARD_API_ADDR").unwrap_or_else(|_| DEFAULT_API_ADDR.into());
        let addr = addr
            .parse()
            .map_err(|e| ShardError::ConfigError(format!("SHARD_API_ADDR {:?}: {}", addr, e)))?;

        let compact_threshold = match std::env::var("SHARD_COMPACT_THRESHOLD") {
            Ok(v) => v.parse().map_err(|e| {
                ShardError::ConfigError(format!("SHARD_COMPACT_THRESHOLD {:?}: {}", v, e))
            })?,
            Err(_) => DEFAULT_COMPACT_THRESHOLD,
        };

        Ok(Self {
            addr,
            dir: std::env::var("SHARD_DIR")
                .unwrap_or_else(|_| DEFAULT_DATA_DIR.into())
                .into(),
            compact_threshold,
            feed: std::env::var("SHARD_FEED").ok().map(PathBuf::from),
        })
    }
}

/// Shared handler state.
pub struct AppState {
    /// Read side of the index
    pub reader: Arc<dyn IndexReader>,
    /// Server start time
    pub started: Instant,
}

impl AppState {
    /// Creates state over the given index reader.
    pub fn new(reader: Arc<dyn IndexReader>) -> Self {
        Self {
            reader,
            started: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.compact_threshold, 1000);
        assert!(config.feed.is_none());
        assert_eq!(config.addr, DEFAULT_API_ADDR.parse().unwrap());
    }
}
