//! Chain observer boundary.
//!
//! A [`ChainObserver`] delivers applied and reverted blocks to the indexer in
//! chain order and reports whether it believes it has caught up with the
//! network. Two implementations ship here:
//!
//! - [`ChannelObserver`]: an in-process feed driven through a [`ChainFeed`]
//! - [`FileObserver`]: replays JSON-lines [`ChainEvent`]s from a file

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use shard_core::error::{Result, ShardError};
use shard_core::types::{Block, ChainEvent};

/// Default capacity of observer channels.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// Receiving half of a subscription.
///
/// An `Err` item means the feed broke; it is always the last item sent.
pub type ChainEvents = mpsc::Receiver<Result<ChainEvent>>;

/// Source of chain events for the indexer.
#[async_trait]
pub trait ChainObserver: Send + Sync {
    /// Starts delivering events from the point where the chain is at
    /// `from_height`.
    ///
    /// The receiver yields events in chain order. It closes without an error
    /// only when the feed ended normally.
    async fn subscribe(&self, from_height: u64) -> Result<ChainEvents>;

    /// Returns whether the observer believes it is caught up.
    fn synced(&self) -> bool;
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHANNEL OBSERVER
// ═══════════════════════════════════════════════════════════════════════════════

/// In-process observer fed through a [`ChainFeed`].
///
/// Events are delivered exactly as sent; `from_height` is not used to filter,
/// since the indexer already ignores blocks it has processed.
pub struct ChannelObserver {
    receiver: Mutex<Option<ChainEvents>>,
    synced: Arc<AtomicBool>,
}

/// Sending half of a [`ChannelObserver`].
#[derive(Clone)]
pub struct ChainFeed {
    sender: mpsc::Sender<Result<ChainEvent>>,
    synced: Arc<AtomicBool>,
}

impl ChannelObserver {
    /// Creates an observer and the feed that drives it.
    pub fn new(capacity: usize) -> (Self, ChainFeed) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let synced = Arc::new(AtomicBool::new(false));
        (
            Self {
                receiver: Mutex::new(Some(receiver)),
                synced: synced.clone(),
            },
            ChainFeed { sender, synced },
        )
    }
}

impl Default for ChannelObserver {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY).0
    }
}

#[async_trait]
impl ChainObserver for ChannelObserver {
    async fn subscribe(&self, from_height: u64) -> Result<ChainEvents> {
        debug!(from_height, "Subscribing to channel feed");
        self.receiver
            .lock()
            .take()
            .ok_or_else(|| ShardError::InternalError("channel feed already subscribed".into()))
    }

    fn synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }
}

impl ChainFeed {
    async fn send(&self, item: Result<ChainEvent>) -> Result<()> {
        self.sender
            .send(item)
            .await
            .map_err(|_| ShardError::InternalError("chain feed receiver dropped".into()))
    }

    /// Delivers a newly applied block.
    pub async fn apply(&self, block: Block) -> Result<()> {
        self.send(Ok(ChainEvent::Apply(block))).await
    }

    /// Delivers a reverted block.
    pub async fn revert(&self, block: Block) -> Result<()> {
        self.send(Ok(ChainEvent::Revert(block))).await
    }

    /// Updates the synced signal and delivers it in order with blocks.
    pub async fn set_synced(&self, synced: bool) -> Result<()> {
        self.synced.store(synced, Ordering::SeqCst);
        self.send(Ok(ChainEvent::Synced(synced))).await
    }

    /// Reports that the upstream source broke. Nothing should be sent after.
    pub async fn fail(&self, error: ShardError) -> Result<()> {
        self.send(Err(error)).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE OBSERVER
// ═══════════════════════════════════════════════════════════════════════════════

/// Observer that replays a JSON-lines file of [`ChainEvent`]s.
///
/// The file is walked as a chain: replay starts at the first block event
/// taken while the chain stands at `from_height` or above, so a reorg
/// appended after a previous run is still delivered. Once the whole file has
/// been read the observer reports itself synced and, if configured, sends
/// `Synced(true)`. A read failure or malformed line ends the feed with an
/// error.
pub struct FileObserver {
    path: PathBuf,
    capacity: usize,
    synced_at_end: bool,
    synced: Arc<AtomicBool>,
}

impl FileObserver {
    /// Creates an observer for the given feed file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            capacity: DEFAULT_FEED_CAPACITY,
            synced_at_end: true,
            synced: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sets the channel capacity.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Controls whether reaching the end of the file counts as being synced.
    pub fn synced_at_end(mut self, enabled: bool) -> Self {
        self.synced_at_end = enabled;
        self
    }

    /// Counts the `apply` events in the feed file (for progress reporting).
    pub async fn count_blocks(&self) -> Result<u64> {
        let file = File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut count = 0;
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let ChainEvent::Apply(_) = serde_json::from_str::<ChainEvent>(&line)? {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Chain height just before `event` takes effect.
fn height_before(event: &ChainEvent) -> Option<u64> {
    match event {
        ChainEvent::Apply(block) => Some(block.height),
        ChainEvent::Revert(block) => Some(block.height.saturating_add(1)),
        ChainEvent::Synced(_) => None,
    }
}

#[async_trait]
impl ChainObserver for FileObserver {
    async fn subscribe(&self, from_height: u64) -> Result<ChainEvents> {
        let file = File::open(&self.path).await.map_err(|e| {
            ShardError::ConfigError(format!("cannot open feed {}: {}", self.path.display(), e))
        })?;

        info!(path = %self.path.display(), from_height, "Replaying chain feed");

        let (tx, rx) = mpsc::channel(self.capacity);
        let synced = self.synced.clone();
        let synced_at_end = self.synced_at_end;
        let path = self.path.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(file).lines();
            let mut line_no = 0u64;
            let mut started = false;
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Feed read failed");
                        let _ = tx.send(Err(ShardError::IoError(e))).await;
                        return;
                    }
                };
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }

                let event: ChainEvent = match serde_json::from_str(&line) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(line = line_no, error = %e, "Malformed feed event, stopping replay");
                        let err = ShardError::Protocol(format!(
                            "malformed feed event at {}:{}: {}",
                            path.display(),
                            line_no,
                            e
                        ));
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                };
                if !started {
                    match height_before(&event) {
                        Some(height) if height >= from_height => started = true,
                        Some(_) => continue,
                        None => {}
                    }
                }
                if tx.send(Ok(event)).await.is_err() {
                    debug!("Feed subscriber dropped");
                    return;
                }
            }

            if synced_at_end {
                synced.store(true, Ordering::SeqCst);
                let _ = tx.send(Ok(ChainEvent::Synced(true))).await;
            }
            debug!(lines = line_no, "Feed replay finished");
        });

        Ok(rx)
    }

    fn synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }
}
