//! Extraction of signed announcements from block data.

use shard_core::error::Result;
use shard_core::types::{AnnouncementRecord, HostAnnouncement, HostPublicKey};
use shard_crypto::verify_record;

/// Turns one arbitrary-data entry of a transaction into an announcement.
///
/// Returns `Ok(None)` for entries that are not announcements at all, and an
/// error for entries that claim to be announcements but do not decode or verify.
pub trait AnnouncementDecoder: Send + Sync {
    /// Decodes a single arbitrary-data entry.
    fn decode(&self, data: &[u8]) -> Result<Option<(HostPublicKey, AnnouncementRecord)>>;
}

/// Default decoder: `announcement || signature` entries tagged with the
/// `HostAnnouncement` specifier, verified against the key they embed.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArbitraryDataDecoder;

impl AnnouncementDecoder for ArbitraryDataDecoder {
    fn decode(&self, data: &[u8]) -> Result<Option<(HostPublicKey, AnnouncementRecord)>> {
        if !HostAnnouncement::has_specifier(data) {
            return Ok(None);
        }

        let record = AnnouncementRecord::from_bytes(data)?;
        let embedded = record.decode()?.public_key;
        verify_record(&record, &embedded)?;

        Ok(Some((embedded, record)))
    }
}
