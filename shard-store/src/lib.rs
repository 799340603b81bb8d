//! # SHARD Store
//!
//! Durable storage of host key → most recent signed announcement.
//!
//! This crate provides two backends for [`AnnouncementStore`]:
//!
//! - **Memory**: Concurrent in-memory map for development and testing
//! - **File**: Snapshot plus append-only journal for single-node deployments
//!
//! ## Example
//!
//! ```rust,ignore
//! use shard_store::{FileStore, FileStoreConfig, AnnouncementStore};
//!
//! let store = FileStore::open(FileStoreConfig::new("./shard-data")).await?;
//!
//! let mut batch = StoreBatch::at_height(1);
//! batch.put(pubkey, record);
//! store.apply(batch).await?; // durable once this returns
//!
//! let record = store.get(&pubkey).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod memory;
mod file;

pub use memory::MemoryStore;
pub use file::{FileStore, FileStoreConfig};

// Re-export the trait from core
pub use shard_core::traits::AnnouncementStore;
