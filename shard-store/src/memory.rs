//! In-memory announcement store.
//!
//! Fast, thread-safe storage suitable for development, testing, and as the
//! read side of [`FileStore`](crate::FileStore).

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, instrument};

use shard_core::error::Result;
use shard_core::traits::AnnouncementStore;
use shard_core::types::{AnnouncementRecord, HostPublicKey, StoreBatch};

/// In-memory announcement store.
///
/// # Thread Safety
///
/// Each key lives in one shard of a concurrent map, so a reader observes a
/// whole record from before or after a write, never a torn one. Height is a
/// separate atomic and is not read together with records.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Primary storage: host key → record
    records: DashMap<HostPublicKey, AnnouncementRecord>,
    /// Last-processed block height
    height: AtomicU64,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with preallocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: DashMap::with_capacity(capacity),
            height: AtomicU64::new(0),
        }
    }

    /// Returns the record for `key` without going through the async trait.
    pub fn record(&self, key: &HostPublicKey) -> Option<AnnouncementRecord> {
        self.records.get(key).map(|entry| entry.value().clone())
    }

    /// Returns the last-processed height.
    pub fn current_height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    /// Returns the number of hosts with a record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no host has a record.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Applies a batch synchronously.
    pub fn apply_batch(&self, batch: StoreBatch) {
        let count = batch.records.len();
        for (key, record) in batch.records {
            self.records.insert(key, record);
        }
        self.height.store(batch.height, Ordering::SeqCst);
        debug!(count, height = batch.height, "Applied batch");
    }

    /// Returns every record (for snapshots).
    pub fn all_records(&self) -> Vec<(HostPublicKey, AnnouncementRecord)> {
        self.records
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Replaces the contents with a loaded snapshot.
    pub fn import(&self, records: Vec<(HostPublicKey, AnnouncementRecord)>, height: u64) -> usize {
        self.records.clear();
        let count = records.len();
        for (key, record) in records {
            self.records.insert(key, record);
        }
        self.height.store(height, Ordering::SeqCst);
        count
    }
}

#[async_trait]
impl AnnouncementStore for MemoryStore {
    async fn get(&self, key: &HostPublicKey) -> Result<Option<AnnouncementRecord>> {
        Ok(self.record(key))
    }

    #[instrument(skip(self, batch), fields(height = batch.height, records = batch.records.len()))]
    async fn apply(&self, batch: StoreBatch) -> Result<()> {
        self.apply_batch(batch);
        Ok(())
    }

    async fn height(&self) -> Result<u64> {
        Ok(self.current_height())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.len())
    }

    async fn keys(&self) -> Result<Vec<HostPublicKey>> {
        Ok(self.records.iter().map(|entry| *entry.key()).collect())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
