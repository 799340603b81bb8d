//! # SHARD Client
//!
//! Resolves a storage host's public key to its most recently announced
//! network address.
//!
//! Two backends implement [`HostKeyResolver`]:
//!
//! - [`ShardClient`]: talks to an untrusted SHARD index server and verifies
//!   every signed announcement against the requested key
//! - [`NodeClient`]: asks a full node's host database, which it trusts, and
//!   can scan a host to check its announced address answers
//!
//! [`Resolver`] picks one of them from a [`ResolverConfig`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use shard_client::{Resolver, ResolverConfig};
//! use shard_core::HostKeyResolver;
//!
//! let resolver = Resolver::from_config(ResolverConfig::shard("shard.example.com:8080")?)?;
//! let addr = resolver.resolve_host_key(&pubkey).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod config;
mod http;
mod node;
mod resolver;
mod shard;

pub use config::{ClientConfig, NodeConfig, ResolverConfig};
pub use node::{
    ConsensusInfo, FeeEstimate, HostEntry, NodeClient, NodePublicKey, NodeTransaction,
    ScannedHost, UnlockConditions, UnspentOutput,
};
pub use resolver::Resolver;
pub use shard::ShardClient;

pub use shard_core::traits::HostKeyResolver;
