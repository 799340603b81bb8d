//! Common traits for SHARD.
//!
//! These traits are the seams between components: the indexer writes through
//! [`AnnouncementStore`], the index server reads through [`IndexReader`], and
//! renters resolve hosts through [`HostKeyResolver`] without knowing which
//! backend answers.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AnnouncementRecord, HostPublicKey, IndexState, NetAddress, StoreBatch};

// ═══════════════════════════════════════════════════════════════════════════════
// STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Durable mapping of host key → most recent signed announcement, plus the
/// last-processed block height.
///
/// Implementations might use:
/// - In-memory storage (for testing/development)
/// - Snapshot + journal files (for single-node deployments)
///
/// A reader of a key sees either the record before a batch or the record after
/// it, never a mix of the two. Records are only ever overwritten.
#[async_trait]
pub trait AnnouncementStore: Send + Sync {
    /// Returns the record for `key`, if any.
    async fn get(&self, key: &HostPublicKey) -> Result<Option<AnnouncementRecord>>;

    /// Writes every record in the batch and records its height.
    ///
    /// For persistent stores the batch is durable once this returns.
    async fn apply(&self, batch: StoreBatch) -> Result<()>;

    /// Returns the last-processed height.
    async fn height(&self) -> Result<u64>;

    /// Returns the number of hosts with a record.
    async fn len(&self) -> Result<usize>;

    /// Returns every key with a record.
    async fn keys(&self) -> Result<Vec<HostPublicKey>>;

    /// Forces any buffered state to disk.
    async fn flush(&self) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// INDEX READER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only view of the index served to remote clients.
///
/// No method blocks on chain activity; answers come from the last
/// processed state.
#[async_trait]
pub trait IndexReader: Send + Sync {
    /// Returns whether the chain observer believes it is caught up.
    fn synced(&self) -> bool;

    /// Returns the number of blocks processed.
    fn height(&self) -> u64;

    /// Returns height and synced flag from one snapshot.
    fn state(&self) -> IndexState {
        IndexState {
            height: self.height(),
            synced: self.synced(),
        }
    }

    /// Returns the stored record for `key`, or `None` if the host never announced.
    async fn announcement_for(&self, key: &HostPublicKey) -> Result<Option<AnnouncementRecord>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESOLVER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Maps a host's public key to its most recently announced address.
///
/// Every implementation reports a missing announcement as
/// [`ShardError::NoAnnouncement`](crate::ShardError::NoAnnouncement).
#[async_trait]
pub trait HostKeyResolver: Send + Sync {
    /// Resolves `key` to the host's network address.
    async fn resolve_host_key(&self, key: &HostPublicKey) -> Result<NetAddress>;
}
