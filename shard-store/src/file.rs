//! File-based announcement store with persistence.
//!
//! Keeps every record in a [`MemoryStore`] and makes each batch durable by
//! appending it to a journal before it becomes visible. The journal is folded
//! into a snapshot every `compact_threshold` batches.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use shard_core::error::{Result, ShardError};
use shard_core::traits::AnnouncementStore;
use shard_core::types::{AnnouncementRecord, HostPublicKey, StoreBatch};

use crate::MemoryStore;

/// Snapshot file name inside the store directory.
const SNAPSHOT_FILE: &str = "announcements.snapshot";
/// Journal file name inside the store directory.
const JOURNAL_FILE: &str = "announcements.journal";

/// File format magic bytes
const MAGIC: &[u8; 4] = b"SHRD";
/// Current file format version
const VERSION: u8 = 1;
/// magic (4) + version (1) + height (8) + count (8)
const HEADER_SIZE: usize = 21;

/// File store configuration.
#[derive(Clone, Debug)]
pub struct FileStoreConfig {
    /// Directory holding the snapshot and journal
    pub dir: PathBuf,
    /// Number of journaled batches after which a snapshot is written
    pub compact_threshold: u64,
}

impl FileStoreConfig {
    /// Creates a config for the given directory with default compaction.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            compact_threshold: 1000,
        }
    }

    /// Sets the compaction threshold (minimum 1).
    pub fn compact_threshold(mut self, threshold: u64) -> Self {
        self.compact_threshold = threshold.max(1);
        self
    }
}

/// One stored record in the snapshot and journal encodings.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    key: HostPublicKey,
    record: AnnouncementRecord,
}

/// One journal line: the records of a batch and its height.
#[derive(Serialize, Deserialize)]
struct JournalEntry {
    height: u64,
    records: Vec<StoredRecord>,
}

impl From<StoreBatch> for JournalEntry {
    fn from(batch: StoreBatch) -> Self {
        Self {
            height: batch.height,
            records: batch
                .records
                .into_iter()
                .map(|(key, record)| StoredRecord { key, record })
                .collect(),
        }
    }
}

impl From<JournalEntry> for StoreBatch {
    fn from(entry: JournalEntry) -> Self {
        Self {
            height: entry.height,
            records: entry
                .records
                .into_iter()
                .map(|stored| (stored.key, stored.record))
                .collect(),
        }
    }
}

/// Open journal plus the number of batches it holds.
struct Journal {
    file: fs::File,
    batches: u64,
}

/// File-based announcement store.
///
/// # File Format
///
/// ```text
/// announcements.snapshot:
///   magic (4 bytes): "SHRD"
///   version (1 byte): 1
///   height (8 bytes): last-processed height
///   count (8 bytes): number of records
///   records (variable): JSON array of {key, record}
///
/// announcements.journal:
///   one JSON line per batch: {height, records: [{key, record}]}
/// ```
///
/// Writers are serialized by an async mutex that readers never take.
pub struct FileStore {
    config: FileStoreConfig,
    /// In-memory read side
    memory: MemoryStore,
    /// Single writer
    journal: Mutex<Journal>,
}

fn persistence(context: &str, err: impl std::fmt::Display) -> ShardError {
    ShardError::Persistence(format!("{}: {}", context, err))
}

impl FileStore {
    /// Opens (or creates) the store in `config.dir`.
    ///
    /// Loads the snapshot, then replays the journal. A torn final journal line
    /// left by a crash mid-append is dropped; any other corruption fails the
    /// open.
    #[instrument(skip(config), fields(dir = ?config.dir))]
    pub async fn open(config: FileStoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.dir)
            .await
            .map_err(|e| persistence("failed to create store directory", e))?;

        let memory = MemoryStore::new();

        let snapshot_path = config.dir.join(SNAPSHOT_FILE);
        if fs::try_exists(&snapshot_path).await? {
            let (records, height) = Self::load_snapshot(&snapshot_path).await?;
            let count = memory.import(records, height);
            info!(count, height, "Loaded snapshot");
        }

        let journal_path = config.dir.join(JOURNAL_FILE);
        let batches = if fs::try_exists(&journal_path).await? {
            Self::replay_journal(&journal_path, &memory).await?
        } else {
            0
        };

        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&journal_path)
            .await
            .map_err(|e| persistence("failed to open journal", e))?;

        info!(
            records = memory.len(),
            height = memory.current_height(),
            journaled = batches,
            "Store opened"
        );

        Ok(Self {
            config,
            memory,
            journal: Mutex::new(Journal { file, batches }),
        })
    }

    /// Opens the store with default configuration.
    pub async fn open_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(FileStoreConfig::new(dir.as_ref())).await
    }

    async fn load_snapshot(path: &Path) -> Result<(Vec<(HostPublicKey, AnnouncementRecord)>, u64)> {
        let contents = fs::read(path)
            .await
            .map_err(|e| persistence("failed to read snapshot", e))?;

        if contents.len() < HEADER_SIZE {
            return Err(ShardError::Persistence("snapshot too short".into()));
        }

        // Verify magic
        if &contents[0..4] != MAGIC {
            return Err(ShardError::Persistence("invalid snapshot magic bytes".into()));
        }

        // Check version
        let version = contents[4];
        if version != VERSION {
            return Err(ShardError::VersionMismatch {
                expected: VERSION,
                actual: version,
            });
        }

        let height = read_u64(&contents[5..13]);
        let count = read_u64(&contents[13..21]);

        let stored: Vec<StoredRecord> = serde_json::from_slice(&contents[HEADER_SIZE..])
            .map_err(|e| persistence("corrupt snapshot body", e))?;

        if stored.len() as u64 != count {
            return Err(ShardError::Persistence(format!(
                "snapshot count mismatch: header says {}, body has {}",
                count,
                stored.len()
            )));
        }

        let records = stored
            .into_iter()
            .map(|s| (s.key, s.record))
            .collect();
        Ok((records, height))
    }

    /// Replays the journal into `memory`, returning the number of batches.
    async fn replay_journal(path: &Path, memory: &MemoryStore) -> Result<u64> {
        let contents = fs::read(path)
            .await
            .map_err(|e| persistence("failed to read journal", e))?;

        let mut batches = 0u64;
        let mut valid_len = 0usize;
        let mut offset = 0usize;

        while offset < contents.len() {
            let rest = &contents[offset..];
            let (line, terminated) = match rest.iter().position(|&b| b == b'\n') {
                Some(pos) => (&rest[..pos], true),
                None => (rest, false),
            };
            let next = offset + line.len() + usize::from(terminated);

            // A batch is committed only once its newline is on disk
            if !terminated {
                warn!(
                    bytes = line.len(),
                    "Discarding torn journal tail from interrupted write"
                );
                break;
            }

            let entry: JournalEntry = serde_json::from_slice(line).map_err(|e| {
                persistence(&format!("corrupt journal entry {}", batches + 1), e)
            })?;
            memory.apply_batch(entry.into());
            batches += 1;
            valid_len = next;
            offset = next;
        }

        if valid_len < contents.len() {
            let file = fs::OpenOptions::new()
                .write(true)
                .open(path)
                .await
                .map_err(|e| persistence("failed to open journal", e))?;
            file.set_len(valid_len as u64)
                .await
                .map_err(|e| persistence("failed to truncate torn journal", e))?;
        }

        debug!(batches, "Journal replayed");
        Ok(batches)
    }

    /// Writes a snapshot of the current state and empties the journal.
    ///
    /// Caller must hold the journal lock.
    async fn compact(&self, journal: &mut Journal) -> Result<()> {
        let records = self.memory.all_records();
        let count = records.len() as u64;
        let height = self.memory.current_height();

        info!(count, height, dir = ?self.config.dir, "Writing snapshot");

        let stored: Vec<StoredRecord> = records
            .into_iter()
            .map(|(key, record)| StoredRecord { key, record })
            .collect();
        let serialized = serde_json::to_vec(&stored)
            .map_err(|e| persistence("failed to serialize snapshot", e))?;

        // Build file contents
        let mut contents = Vec::with_capacity(HEADER_SIZE + serialized.len());
        contents.extend_from_slice(MAGIC);
        contents.push(VERSION);
        contents.extend_from_slice(&height.to_le_bytes());
        contents.extend_from_slice(&count.to_le_bytes());
        contents.extend_from_slice(&serialized);

        // Write atomically (write to temp, then rename)
        let path = self.config.dir.join(SNAPSHOT_FILE);
        let temp_path = path.with_extension("tmp");
        let write = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&contents).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &path).await?;
            journal.file.set_len(0).await?;
            journal.file.sync_all().await
        };
        write.await.map_err(|e| {
            error!(error = %e, "Snapshot write failed");
            persistence("failed to write snapshot", e)
        })?;

        journal.batches = 0;
        debug!("Snapshot written");
        Ok(())
    }

    /// Returns the store directory.
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// Returns the underlying memory store for direct access.
    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Returns the number of batches written since the last snapshot.
    pub async fn journaled_batches(&self) -> u64 {
        self.journal.lock().await.batches
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

#[async_trait]
impl AnnouncementStore for FileStore {
    async fn get(&self, key: &HostPublicKey) -> Result<Option<AnnouncementRecord>> {
        Ok(self.memory.record(key))
    }

    #[instrument(skip(self, batch), fields(height = batch.height, records = batch.records.len()))]
    async fn apply(&self, batch: StoreBatch) -> Result<()> {
        let mut journal = self.journal.lock().await;

        let entry = JournalEntry::from(batch.clone());
        let mut line = serde_json::to_vec(&entry)
            .map_err(|e| persistence("failed to serialize batch", e))?;
        line.push(b'\n');

        let write = async {
            journal.file.write_all(&line).await?;
            journal.file.sync_data().await
        };
        write.await.map_err(|e| {
            error!(error = %e, "Journal append failed");
            persistence("failed to append to journal", e)
        })?;

        self.memory.apply_batch(batch);
        journal.batches += 1;

        if journal.batches >= self.config.compact_threshold {
            self.compact(&mut journal).await?;
        }
        Ok(())
    }

    async fn height(&self) -> Result<u64> {
        Ok(self.memory.current_height())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.memory.len())
    }

    async fn keys(&self) -> Result<Vec<HostPublicKey>> {
        self.memory.keys().await
    }

    async fn flush(&self) -> Result<()> {
        let mut journal = self.journal.lock().await;
        if journal.batches > 0 {
            self.compact(&mut journal).await?;
        }
        Ok(())
    }
}
