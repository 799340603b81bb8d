//! # SHARD Index Server
//!
//! Read-only HTTP interface to the host announcement index.
//!
//! ## Endpoints
//!
//! - `GET /synced` - `true` or `false`
//! - `GET /height` - Number of blocks processed, in decimal
//! - `GET /host/:pubkey` - Signed announcement bytes for a host, `404` if none
//! - `GET /health` - JSON status
//!
//! The server hands out signed records verbatim and never needs to be trusted:
//! clients verify every record against the key they asked for.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shard_api::IndexServer;
//!
//! let indexer = Arc::new(Indexer::new(store).await?);
//! IndexServer::new(indexer).run("0.0.0.0:8080".parse()?).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod dto;
mod error;
mod handlers;
mod routes;
mod state;

pub use dto::HealthResponse;
pub use error::{ApiError, NOT_FOUND_MESSAGE};
pub use routes::create_router;
pub use state::{AppState, ServerConfig, DEFAULT_COMPACT_THRESHOLD, DEFAULT_DATA_DIR};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use shard_core::traits::IndexReader;

/// HTTP server over an [`IndexReader`].
pub struct IndexServer {
    state: Arc<AppState>,
}

impl IndexServer {
    /// Creates a server answering from `reader`.
    pub fn new(reader: Arc<dyn IndexReader>) -> Self {
        Self {
            state: Arc::new(AppState::new(reader)),
        }
    }

    /// Creates the router with all routes configured.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        create_router(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Runs the server on the given address.
    pub async fn run(self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, std::future::pending()).await
    }

    /// Serves on an already bound listener until `shutdown` completes.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        info!("SHARD index server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }
}
