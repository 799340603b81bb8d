//! The indexer: folds chain events into the announcement store.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use shard_core::error::{Result, ShardError};
use shard_core::traits::{AnnouncementStore, IndexReader};
use shard_core::types::{AnnouncementRecord, Block, ChainEvent, HostPublicKey, StoreBatch};

use crate::decoder::{AnnouncementDecoder, ArbitraryDataDecoder};
use crate::observer::ChainObserver;

/// Result of observing one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObserveOutcome {
    /// The block was indexed and the height advanced by one.
    Applied {
        /// Announcements written to the store
        stored: usize,
        /// Announcement-like entries that failed to decode or verify
        skipped: usize,
    },
    /// The block was below the current height and changed nothing.
    AlreadyProcessed,
}

/// Running counters for an indexer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IndexerStats {
    /// Blocks applied
    pub blocks_applied: u64,
    /// Blocks reverted
    pub blocks_reverted: u64,
    /// Announcements written to the store
    pub announcements_stored: u64,
    /// Announcements rejected as malformed or badly signed
    pub announcements_skipped: u64,
    /// When the last block was applied
    pub last_block_time: Option<DateTime<Utc>>,
}

/// Maintains the key → announcement index from a stream of blocks.
///
/// Updates run one at a time; reads through [`IndexReader`] never wait on them.
pub struct Indexer {
    store: Arc<dyn AnnouncementStore>,
    decoder: Box<dyn AnnouncementDecoder>,
    /// Number of blocks processed, mirrored from the store
    height: AtomicU64,
    synced: AtomicBool,
    stats: RwLock<IndexerStats>,
    /// Serializes observe/revert
    update: tokio::sync::Mutex<()>,
}

impl Indexer {
    /// Creates an indexer over `store`, resuming from its height.
    pub async fn new(store: Arc<dyn AnnouncementStore>) -> Result<Self> {
        Self::with_decoder(store, Box::new(ArbitraryDataDecoder)).await
    }

    /// Creates an indexer with a custom announcement decoder.
    pub async fn with_decoder(
        store: Arc<dyn AnnouncementStore>,
        decoder: Box<dyn AnnouncementDecoder>,
    ) -> Result<Self> {
        let height = store.height().await?;
        info!(height, "Indexer resuming");

        Ok(Self {
            store,
            decoder,
            height: AtomicU64::new(height),
            synced: AtomicBool::new(false),
            stats: RwLock::new(IndexerStats::default()),
            update: tokio::sync::Mutex::new(()),
        })
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<dyn AnnouncementStore> {
        &self.store
    }

    /// Returns the current counters.
    pub fn stats(&self) -> IndexerStats {
        self.stats.read().clone()
    }

    /// Records the chain observer's synced signal.
    pub fn set_synced(&self, synced: bool) {
        if self.synced.swap(synced, Ordering::SeqCst) != synced {
            info!(synced, "Sync state changed");
        }
    }

    fn collect(&self, block: &Block) -> (StoreBatch, usize) {
        let mut batch = StoreBatch::at_height(block.height + 1);
        let mut skipped = 0;

        for tx in &block.transactions {
            for data in &tx.arbitrary_data {
                match self.decoder.decode(data) {
                    Ok(Some((key, record))) => {
                        debug!(host = %key, "Found announcement");
                        batch.put(key, record);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(
                            block = block.height,
                            tx = ?tx.id,
                            error = %e,
                            "Skipping invalid announcement"
                        );
                        skipped += 1;
                    }
                }
            }
        }

        (batch, skipped)
    }

    /// Indexes one block.
    ///
    /// The block must be at the current height; lower heights are a no-op and
    /// higher ones are a [`ShardError::ChainGap`]. A store failure is returned
    /// unchanged and leaves the height where it was.
    #[instrument(skip(self, block), fields(height = block.height))]
    pub async fn observe(&self, block: &Block) -> Result<ObserveOutcome> {
        let _guard = self.update.lock().await;
        let current = self.height.load(Ordering::SeqCst);

        if block.height < current {
            debug!(current, "Block already processed");
            return Ok(ObserveOutcome::AlreadyProcessed);
        }
        if block.height > current {
            return Err(ShardError::ChainGap {
                expected: current,
                actual: block.height,
            });
        }

        let (batch, skipped) = self.collect(block);
        let stored = batch.records.len();

        if let Err(e) = self.store.apply(batch).await {
            error!(error = %e, "Failed to persist block");
            return Err(e);
        }
        self.height.store(current + 1, Ordering::SeqCst);

        let mut stats = self.stats.write();
        stats.blocks_applied += 1;
        stats.announcements_stored += stored as u64;
        stats.announcements_skipped += skipped as u64;
        stats.last_block_time = Some(Utc::now());

        debug!(stored, skipped, "Block indexed");
        Ok(ObserveOutcome::Applied { stored, skipped })
    }

    /// Reverts the tip block.
    ///
    /// Only lowers the height. Records are kept: a host's announcement is
    /// superseded by later ones, never removed.
    #[instrument(skip(self, block), fields(height = block.height))]
    pub async fn revert(&self, block: &Block) -> Result<()> {
        let _guard = self.update.lock().await;
        let current = self.height.load(Ordering::SeqCst);

        if current.checked_sub(1) != Some(block.height) {
            return Err(ShardError::InvalidRevert {
                tip: current.saturating_sub(1),
                actual: block.height,
            });
        }

        if let Err(e) = self.store.apply(StoreBatch::at_height(block.height)).await {
            error!(error = %e, "Failed to persist revert");
            return Err(e);
        }
        self.height.store(block.height, Ordering::SeqCst);
        self.stats.write().blocks_reverted += 1;

        info!("Block reverted");
        Ok(())
    }

    /// Handles one chain event.
    pub async fn handle(&self, event: ChainEvent) -> Result<()> {
        match event {
            ChainEvent::Apply(block) => self.observe(&block).await.map(|_| ()),
            ChainEvent::Revert(block) => self.revert(&block).await,
            ChainEvent::Synced(synced) => {
                self.set_synced(synced);
                Ok(())
            }
        }
    }

    /// Subscribes to `observer` and processes events until the feed closes.
    ///
    /// Any error, from the feed or from indexing, stops the loop and is
    /// returned; a persistence failure means the index can no longer be
    /// trusted and the process should exit.
    #[instrument(skip(self, observer))]
    pub async fn run(&self, observer: &dyn ChainObserver) -> Result<()> {
        let from = self.height.load(Ordering::SeqCst);
        let mut events = observer.subscribe(from).await?;
        self.set_synced(observer.synced());

        info!(from, "Indexer running");

        while let Some(event) = events.recv().await {
            let handled = match event {
                Ok(event) => self.handle(event).await,
                Err(e) => Err(e),
            };
            if let Err(e) = handled {
                error!(error = %e, fatal = e.is_fatal(), "Indexer stopped");
                return Err(e);
            }
        }

        self.store.flush().await?;
        info!(height = self.height(), "Chain feed closed");
        Ok(())
    }
}

#[async_trait]
impl IndexReader for Indexer {
    fn synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    fn height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    async fn announcement_for(&self, key: &HostPublicKey) -> Result<Option<AnnouncementRecord>> {
        self.store.get(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use shard_core::types::{IndexState, NetAddress, Signature, Transaction};
    use shard_crypto::{host_public_key, sign_announcement, SigningKey};
    use shard_store::{FileStore, FileStoreConfig, MemoryStore};

    use crate::observer::{ChannelObserver, FileObserver};

    fn key(seed: u64) -> SigningKey {
        SigningKey::generate(&mut ChaCha20Rng::seed_from_u64(seed))
    }

    fn announce(key: &SigningKey, addr: &str) -> Vec<u8> {
        sign_announcement(key, NetAddress::parse(addr).unwrap()).to_bytes()
    }

    fn block(height: u64, data: Vec<Vec<u8>>) -> Block {
        Block::with_transactions(height, vec![Transaction::with_arbitrary_data(data)])
    }

    async fn memory_indexer() -> Indexer {
        Indexer::new(Arc::new(MemoryStore::new())).await.unwrap()
    }

    async fn resolve(indexer: &Indexer, key: &SigningKey) -> Option<NetAddress> {
        indexer
            .announcement_for(&host_public_key(key))
            .await
            .unwrap()
            .map(|record| record.decode().unwrap().net_address)
    }

    #[tokio::test]
    async fn test_observe_stores_announcement() {
        let indexer = memory_indexer().await;
        let host = key(1);

        let outcome = indexer
            .observe(&block(0, vec![announce(&host, "host:9982")]))
            .await
            .unwrap();

        assert_eq!(outcome, ObserveOutcome::Applied { stored: 1, skipped: 0 });
        assert_eq!(indexer.height(), 1);
        assert_eq!(resolve(&indexer, &host).await.unwrap().as_str(), "host:9982");
    }

    #[tokio::test]
    async fn test_height_counts_blocks() {
        let indexer = memory_indexer().await;
        for h in 0..5 {
            indexer.observe(&Block::empty(h)).await.unwrap();
        }
        assert_eq!(indexer.height(), 5);
        assert_eq!(indexer.stats().blocks_applied, 5);
    }

    #[tokio::test]
    async fn test_replay_is_noop() {
        let indexer = memory_indexer().await;
        let host = key(2);
        let b0 = block(0, vec![announce(&host, "a:1")]);
        indexer.observe(&b0).await.unwrap();
        indexer.observe(&block(1, vec![announce(&host, "b:2")])).await.unwrap();

        assert_eq!(
            indexer.observe(&b0).await.unwrap(),
            ObserveOutcome::AlreadyProcessed
        );
        assert_eq!(indexer.height(), 2);
        assert_eq!(resolve(&indexer, &host).await.unwrap().as_str(), "b:2");
    }

    #[tokio::test]
    async fn test_gap_rejected() {
        let indexer = memory_indexer().await;
        let err = indexer.observe(&Block::empty(3)).await.unwrap_err();
        assert!(matches!(err, ShardError::ChainGap { expected: 0, actual: 3 }));
        assert_eq!(indexer.height(), 0);
    }

    #[tokio::test]
    async fn test_later_announcement_wins() {
        let indexer = memory_indexer().await;
        let host = key(3);

        indexer
            .observe(&block(0, vec![announce(&host, "first:1"), announce(&host, "second:2")]))
            .await
            .unwrap();
        assert_eq!(resolve(&indexer, &host).await.unwrap().as_str(), "second:2");

        indexer.observe(&block(1, vec![announce(&host, "third:3")])).await.unwrap();
        assert_eq!(resolve(&indexer, &host).await.unwrap().as_str(), "third:3");
        assert_eq!(indexer.store().keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_announcement_skipped() {
        let indexer = memory_indexer().await;
        let good = key(4);
        let bad = key(5);

        let mut forged = sign_announcement(&bad, NetAddress::parse("evil:1").unwrap());
        forged.signature = Signature([7; 64]);

        let outcome = indexer
            .observe(&block(
                0,
                vec![
                    forged.to_bytes(),
                    b"HostAnnouncement-garbage".to_vec(),
                    b"unrelated data".to_vec(),
                    announce(&good, "good:1"),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(outcome, ObserveOutcome::Applied { stored: 1, skipped: 2 });
        assert_eq!(indexer.height(), 1);
        assert!(resolve(&indexer, &bad).await.is_none());
        assert!(resolve(&indexer, &good).await.is_some());
        assert_eq!(indexer.stats().announcements_skipped, 2);
    }

    #[tokio::test]
    async fn test_revert_tip_only() {
        let indexer = memory_indexer().await;
        let host = key(6);
        indexer.observe(&Block::empty(0)).await.unwrap();
        indexer.observe(&block(1, vec![announce(&host, "a:1")])).await.unwrap();

        assert!(matches!(
            indexer.revert(&Block::empty(0)).await,
            Err(ShardError::InvalidRevert { tip: 1, actual: 0 })
        ));

        indexer.revert(&Block::empty(1)).await.unwrap();
        assert_eq!(indexer.height(), 1);
        assert_eq!(indexer.store().height().await.unwrap(), 1);
        // Record survives the revert
        assert!(resolve(&indexer, &host).await.is_some());

        // The replacement block is accepted at the same height
        indexer.observe(&block(1, vec![announce(&host, "b:2")])).await.unwrap();
        assert_eq!(resolve(&indexer, &host).await.unwrap().as_str(), "b:2");
    }

    #[tokio::test]
    async fn test_revert_empty_index() {
        let indexer = memory_indexer().await;
        assert!(indexer.revert(&Block::empty(0)).await.is_err());
    }

    #[tokio::test]
    async fn test_revert_far_above_tip() {
        let indexer = memory_indexer().await;
        indexer.observe(&Block::empty(0)).await.unwrap();

        assert!(matches!(
            indexer.revert(&Block::empty(u64::MAX)).await,
            Err(ShardError::InvalidRevert { tip: 0, actual: u64::MAX })
        ));
        assert_eq!(indexer.height(), 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store_dir = dir.path().join("store");
        let store = FileStore::open(FileStoreConfig::new(&store_dir).compact_threshold(1))
            .await
            .unwrap();
        let indexer = Indexer::new(Arc::new(store)).await.unwrap();

        std::fs::remove_dir_all(&store_dir).unwrap();

        let (observer, feed) = ChannelObserver::new(4);
        feed.apply(Block::empty(0)).await.unwrap();
        feed.apply(Block::empty(1)).await.unwrap();
        drop(feed);

        let err = indexer.run(&observer).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_run_processes_feed() {
        let indexer = memory_indexer().await;
        let host = key(7);
        let (observer, feed) = ChannelObserver::new(16);

        feed.apply(Block::empty(0)).await.unwrap();
        feed.apply(block(1, vec![announce(&host, "h:1")])).await.unwrap();
        feed.set_synced(true).await.unwrap();
        feed.apply(Block::empty(0)).await.unwrap();
        drop(feed);

        indexer.run(&observer).await.unwrap();
        assert_eq!(indexer.state(), IndexState { height: 2, synced: true });
        assert!(resolve(&indexer, &host).await.is_some());
    }

    fn write_feed(lines: &[String]) -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    fn line(event: &ChainEvent) -> String {
        serde_json::to_string(event).unwrap()
    }

    #[tokio::test]
    async fn test_run_fails_on_corrupt_feed() {
        let indexer = memory_indexer().await;
        let mut lines = vec![line(&ChainEvent::Apply(Block::empty(0))), "{corrupt".to_string()];
        lines.extend((1..5).map(|h| line(&ChainEvent::Apply(Block::empty(h)))));
        let feed = write_feed(&lines);

        let err = indexer.run(&FileObserver::new(feed.path())).await.unwrap_err();
        assert!(matches!(err, ShardError::Protocol(_)));
        assert_eq!(indexer.state(), IndexState { height: 1, synced: false });
    }

    #[tokio::test]
    async fn test_run_fails_on_feed_error() {
        let indexer = memory_indexer().await;
        let (observer, feed) = ChannelObserver::new(4);
        feed.apply(Block::empty(0)).await.unwrap();
        feed.fail(ShardError::Transport("connection reset".into())).await.unwrap();
        drop(feed);

        assert!(matches!(
            indexer.run(&observer).await,
            Err(ShardError::Transport(_))
        ));
        assert_eq!(indexer.height(), 1);
    }

    #[tokio::test]
    async fn test_restart_picks_up_reorg() {
        let dir = tempfile::tempdir().unwrap();
        let host = key(9);
        let mut lines = vec![
            line(&ChainEvent::Apply(Block::empty(0))),
            line(&ChainEvent::Apply(block(1, vec![announce(&host, "old:1")]))),
        ];
        {
            let store = FileStore::open_dir(dir.path()).await.unwrap();
            let indexer = Indexer::new(Arc::new(store)).await.unwrap();
            indexer.run(&FileObserver::new(write_feed(&lines).path())).await.unwrap();
            assert_eq!(indexer.height(), 2);
        }

        // The feed grows a reorg of block 1 while the indexer is down
        lines.push(line(&ChainEvent::Revert(block(1, vec![announce(&host, "old:1")]))));
        lines.push(line(&ChainEvent::Apply(block(1, vec![announce(&host, "new:1")]))));
        let feed = write_feed(&lines);

        let store = FileStore::open_dir(dir.path()).await.unwrap();
        let indexer = Indexer::new(Arc::new(store)).await.unwrap();
        indexer.run(&FileObserver::new(feed.path())).await.unwrap();

        assert_eq!(indexer.height(), 2);
        assert_eq!(indexer.stats().blocks_reverted, 1);
        assert_eq!(resolve(&indexer, &host).await.unwrap().as_str(), "new:1");
    }

    #[tokio::test]
    async fn test_resume_from_store_height() {
        let dir = tempfile::tempdir().unwrap();
        let host = key(8);
        {
            let store = FileStore::open_dir(dir.path()).await.unwrap();
            let indexer = Indexer::new(Arc::new(store)).await.unwrap();
            indexer.observe(&Block::empty(0)).await.unwrap();
            indexer.observe(&block(1, vec![announce(&host, "h:1")])).await.unwrap();
        }

        let store = FileStore::open_dir(dir.path()).await.unwrap();
        let indexer = Indexer::new(Arc::new(store)).await.unwrap();
        assert_eq!(indexer.height(), 2);
        assert_eq!(resolve(&indexer, &host).await.unwrap().as_str(), "h:1");
        assert_eq!(
            indexer.observe(&Block::empty(1)).await.unwrap(),
            ObserveOutcome::AlreadyProcessed
        );
    }
}
