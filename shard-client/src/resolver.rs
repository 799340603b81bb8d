//! Backend selection behind one resolver type.

use async_trait::async_trait;

use shard_core::error::Result;
use shard_core::traits::HostKeyResolver;
use shard_core::types::{HostPublicKey, NetAddress};

use crate::config::ResolverConfig;
use crate::node::NodeClient;
use crate::shard::ShardClient;

/// Host key resolver with its backend fixed at construction.
///
/// Results, including [`ShardError::NoAnnouncement`](shard_core::ShardError::NoAnnouncement),
/// are the same whichever backend answers. There is no fallback between them.
#[derive(Clone, Debug)]
pub enum Resolver {
    /// Index server, every answer verified
    Verified(ShardClient),
    /// Trusted full node
    Node(NodeClient),
}

impl Resolver {
    /// Builds the resolver described by `config`.
    pub fn from_config(config: ResolverConfig) -> Result<Self> {
        Ok(match config {
            ResolverConfig::Verified(config) => Resolver::Verified(ShardClient::with_config(config)?),
            ResolverConfig::Node(config) => Resolver::Node(NodeClient::with_config(config)?),
        })
    }

    /// Returns the number of blocks the backend has seen.
    pub async fn chain_height(&self) -> Result<u64> {
        match self {
            Resolver::Verified(client) => client.chain_height().await,
            Resolver::Node(client) => client.chain_height().await,
        }
    }

    /// Returns whether the backend believes it is synchronized.
    pub async fn synced(&self) -> Result<bool> {
        match self {
            Resolver::Verified(client) => client.synced().await,
            Resolver::Node(client) => client.synced().await,
        }
    }

    /// Returns a short backend name for display.
    pub fn backend(&self) -> &'static str {
        match self {
            Resolver::Verified(_) => "shard",
            Resolver::Node(_) => "node",
        }
    }
}

#[async_trait]
impl HostKeyResolver for Resolver {
    async fn resolve_host_key(&self, key: &HostPublicKey) -> Result<NetAddress> {
        match self {
            Resolver::Verified(client) => client.resolve_host_key(key).await,
            Resolver::Node(client) => client.resolve_host_key(key).await,
        }
    }
}
