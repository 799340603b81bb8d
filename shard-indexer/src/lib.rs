//! # SHARD Indexer
//!
//! Follows the chain and records, for every host key, the most recent valid
//! announcement seen in block arbitrary data.
//!
//! ## Features
//!
//! - **Idempotent replay**: Blocks below the current height are ignored
//! - **Tip reverts**: Reorganizations lower the height without losing records
//! - **Pluggable decoding**: Announcement extraction behind [`AnnouncementDecoder`]
//! - **Chain feeds**: In-process channel or JSON-lines file via [`ChainObserver`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shard_indexer::{FileObserver, Indexer};
//! use shard_store::FileStore;
//!
//! let store = Arc::new(FileStore::open_dir("./shard-data").await?);
//! let indexer = Indexer::new(store).await?;
//!
//! indexer.run(&FileObserver::new("chain.jsonl")).await?;
//! println!("indexed {} blocks", indexer.height());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod decoder;
pub mod indexer;
pub mod observer;

pub use decoder::{AnnouncementDecoder, ArbitraryDataDecoder};
pub use indexer::{Indexer, IndexerStats, ObserveOutcome};
pub use observer::{ChainEvents, ChainFeed, ChainObserver, ChannelObserver, FileObserver};
