//! Chain types delivered by the chain observer, and the index's own state.
//!
//! Block validation happens upstream; the index only sees confirmed blocks
//! in height order.

use serde::{Deserialize, Serialize};

use crate::types::AnnouncementRecord;
use crate::types::HostPublicKey;

/// Identifier of a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(#[serde(with = "hex::serde")] pub [u8; 32]);

/// Identifier of a transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(#[serde(with = "hex::serde")] pub [u8; 32]);

/// The part of a transaction the index cares about.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction identifier
    #[serde(default)]
    pub id: TransactionId,
    /// Opaque payloads; announcements travel here
    #[serde(default, with = "hex_vec")]
    pub arbitrary_data: Vec<Vec<u8>>,
}

impl Transaction {
    /// Creates a transaction carrying the given arbitrary data.
    pub fn with_arbitrary_data(arbitrary_data: Vec<Vec<u8>>) -> Self {
        Self {
            id: TransactionId::default(),
            arbitrary_data,
        }
    }
}

/// A confirmed block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Height of the block (the genesis block is height 0)
    pub height: u64,
    /// Block identifier
    #[serde(default)]
    pub id: BlockId,
    /// Transactions in block order
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Creates a block at `height` with no transactions.
    pub fn empty(height: u64) -> Self {
        Self {
            height,
            id: BlockId::default(),
            transactions: Vec::new(),
        }
    }

    /// Creates a block at `height` with the given transactions.
    pub fn with_transactions(height: u64, transactions: Vec<Transaction>) -> Self {
        Self {
            height,
            id: BlockId::default(),
            transactions,
        }
    }
}

/// An event delivered by the chain observer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChainEvent {
    /// A block was added to the tip.
    Apply(Block),
    /// The tip block was removed by a reorganization.
    Revert(Block),
    /// The observer's synced signal changed.
    Synced(bool),
}

/// Progress of the index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexState {
    /// Number of blocks processed; the next expected block height
    pub height: u64,
    /// Whether the chain observer believes it is caught up
    pub synced: bool,
}

/// A set of record overwrites applied together with a new height.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreBatch {
    /// Records to write; later entries for the same key win
    pub records: Vec<(HostPublicKey, AnnouncementRecord)>,
    /// Last-processed height after this batch
    pub height: u64,
}

impl StoreBatch {
    /// Creates an empty batch that only moves the height.
    pub fn at_height(height: u64) -> Self {
        Self {
            records: Vec::new(),
            height,
        }
    }

    /// Adds a record overwrite.
    pub fn put(&mut self, key: HostPublicKey, record: AnnouncementRecord) {
        self.records.push((key, record));
    }
}

mod hex_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(items: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(items.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let strings = Vec::<String>::deserialize(deserializer)?;
        strings
            .iter()
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_event_json() {
        let event = ChainEvent::Apply(Block::with_transactions(
            3,
            vec![Transaction::with_arbitrary_data(vec![vec![0xde, 0xad]])],
        ));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"apply\""));
        assert!(json.contains("\"dead\""));

        let back: ChainEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_minimal_block_json() {
        let event: ChainEvent =
            serde_json::from_str(r#"{"type":"apply","data":{"height":7}}"#).unwrap();
        assert_eq!(event, ChainEvent::Apply(Block::empty(7)));

        let event: ChainEvent = serde_json::from_str(r#"{"type":"synced","data":true}"#).unwrap();
        assert_eq!(event, ChainEvent::Synced(true));
    }

    #[test]
    fn test_store_batch() {
        let mut batch = StoreBatch::at_height(5);
        assert!(batch.records.is_empty());
        batch.put(
            HostPublicKey::ed25519([1; 32]),
            AnnouncementRecord::new(vec![1], crate::types::Signature([0; 64])),
        );
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.height, 5);
    }
}
