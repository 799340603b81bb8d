//! Host announcement types.
//!
//! A host announces itself by publishing a [`HostAnnouncement`] signed with its
//! key. The index stores the exact signed bytes as an [`AnnouncementRecord`] so
//! any reader can redo verification bit-for-bit.

use serde::{Deserialize, Serialize};

use crate::constants::{
    ANNOUNCEMENT_SPECIFIER, ED25519_PUBLIC_KEY_SIZE, MAX_NET_ADDRESS_LEN, MIN_ANNOUNCEMENT_SIZE,
    SIGNATURE_SIZE, SPECIFIER_SIZE,
};
use crate::error::{Result, ShardError};
use crate::types::{HostPublicKey, NetAddress, Signature, SignatureAlgorithm};

/// The signed payload a host publishes on chain.
///
/// # Wire Format (binary, integers little-endian)
/// ```text
/// "HostAnnouncement" (16) || addr_len (8) || addr || algorithm (16) || key_len (8) || key
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostAnnouncement {
    /// Address the host can be reached at
    pub net_address: NetAddress,
    /// Key the announcement is signed with
    pub public_key: HostPublicKey,
}

impl HostAnnouncement {
    /// Creates a new announcement.
    pub fn new(net_address: NetAddress, public_key: HostPublicKey) -> Self {
        Self {
            net_address,
            public_key,
        }
    }

    /// Serializes to the canonical binary encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let addr = self.net_address.as_str().as_bytes();
        let key = self.public_key.as_bytes();

        let mut bytes = Vec::with_capacity(MIN_ANNOUNCEMENT_SIZE + addr.len());
        bytes.extend_from_slice(&ANNOUNCEMENT_SPECIFIER);
        bytes.extend_from_slice(&(addr.len() as u64).to_le_bytes());
        bytes.extend_from_slice(addr);
        bytes.extend_from_slice(&self.public_key.algorithm().specifier());
        bytes.extend_from_slice(&(key.len() as u64).to_le_bytes());
        bytes.extend_from_slice(key);
        bytes
    }

    /// Deserializes from the canonical binary encoding.
    ///
    /// The whole input must be consumed; trailing bytes are an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);

        if reader.take(SPECIFIER_SIZE)? != ANNOUNCEMENT_SPECIFIER {
            return Err(ShardError::InvalidAnnouncement("wrong specifier".into()));
        }

        let addr_len = reader.read_len(MAX_NET_ADDRESS_LEN)?;
        let addr = std::str::from_utf8(reader.take(addr_len)?)
            .map_err(|_| ShardError::InvalidAnnouncement("address is not UTF-8".into()))?;
        let net_address = NetAddress::parse(addr)
            .map_err(|e| ShardError::InvalidAnnouncement(e.to_string()))?;

        let algorithm = SignatureAlgorithm::from_specifier(reader.take(SPECIFIER_SIZE)?)
            .map_err(|e| ShardError::InvalidAnnouncement(e.to_string()))?;
        let key_len = reader.read_len(ED25519_PUBLIC_KEY_SIZE)?;
        let public_key = HostPublicKey::from_bytes(algorithm, reader.take(key_len)?)
            .map_err(|e| ShardError::InvalidAnnouncement(e.to_string()))?;

        if !reader.is_empty() {
            return Err(ShardError::InvalidAnnouncement(format!(
                "{} trailing bytes",
                reader.remaining()
            )));
        }

        Ok(Self {
            net_address,
            public_key,
        })
    }

    /// Returns true if `bytes` starts with the announcement specifier.
    pub fn has_specifier(bytes: &[u8]) -> bool {
        bytes.starts_with(&ANNOUNCEMENT_SPECIFIER)
    }
}

/// Cursor over an untrusted byte slice.
struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.bytes.len() < n {
            return Err(ShardError::InvalidAnnouncement(format!(
                "truncated: need {} bytes, have {}",
                n,
                self.bytes.len()
            )));
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    fn read_len(&mut self, max: usize) -> Result<usize> {
        let raw: [u8; 8] = self
            .take(8)?
            .try_into()
            .map_err(|_| ShardError::InvalidAnnouncement("invalid length prefix".into()))?;
        let len = u64::from_le_bytes(raw);
        if len > max as u64 {
            return Err(ShardError::InvalidAnnouncement(format!(
                "length {} exceeds limit {}",
                len, max
            )));
        }
        Ok(len as usize)
    }

    fn remaining(&self) -> usize {
        self.bytes.len()
    }

    fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STORED RECORD
// ═══════════════════════════════════════════════════════════════════════════════

/// A signed announcement exactly as observed on chain.
///
/// # Wire Format
/// ```text
/// announcement (variable) || signature (64)
/// ```
/// This is also the body of a successful `GET /host/{pubkey}` response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementRecord {
    /// Encoded [`HostAnnouncement`], never reparsed on write
    #[serde(with = "hex")]
    pub announcement: Vec<u8>,
    /// Signature over the announcement's content hash
    pub signature: Signature,
}

impl AnnouncementRecord {
    /// Creates a record from encoded announcement bytes and a signature.
    pub fn new(announcement: Vec<u8>, signature: Signature) -> Self {
        Self {
            announcement,
            signature,
        }
    }

    /// Serializes to `announcement || signature`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.announcement.len() + SIGNATURE_SIZE);
        bytes.extend_from_slice(&self.announcement);
        bytes.extend_from_slice(self.signature.as_bytes());
        bytes
    }

    /// Splits `announcement || signature`.
    ///
    /// Only the framing is checked here; use [`AnnouncementRecord::decode`] to
    /// parse the announcement itself.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_ANNOUNCEMENT_SIZE + SIGNATURE_SIZE {
            return Err(ShardError::Protocol(format!(
                "record too short: {} bytes, minimum {}",
                bytes.len(),
                MIN_ANNOUNCEMENT_SIZE + SIGNATURE_SIZE
            )));
        }
        let (announcement, signature) = bytes.split_at(bytes.len() - SIGNATURE_SIZE);
        Ok(Self {
            announcement: announcement.to_vec(),
            signature: Signature::from_slice(signature)?,
        })
    }

    /// Decodes the stored announcement.
    pub fn decode(&self) -> Result<HostAnnouncement> {
        HostAnnouncement::from_bytes(&self.announcement)
    }
}
