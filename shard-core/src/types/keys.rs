//! Key and signature types for SHARD.
//!
//! - [`SignatureAlgorithm`]: Algorithm tag carried by every host key
//! - [`HostPublicKey`]: The index key, `algorithm:hex` in text form
//! - [`Signature`]: Fixed-size announcement signature

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    ED25519_PREFIX, ED25519_PUBLIC_KEY_SIZE, ED25519_SPECIFIER, SIGNATURE_SIZE, SPECIFIER_SIZE,
};
use crate::error::{Result, ShardError};

// ═══════════════════════════════════════════════════════════════════════════════
// ALGORITHM
// ═══════════════════════════════════════════════════════════════════════════════

/// Signature scheme of a host key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignatureAlgorithm {
    /// Ed25519 (RFC 8032)
    #[default]
    Ed25519,
}

impl SignatureAlgorithm {
    /// Returns the textual prefix used in `algorithm:hex` keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Ed25519 => ED25519_PREFIX,
        }
    }

    /// Returns the zero-padded binary specifier.
    pub fn specifier(&self) -> [u8; SPECIFIER_SIZE] {
        match self {
            SignatureAlgorithm::Ed25519 => ED25519_SPECIFIER,
        }
    }

    /// Parses a binary specifier.
    pub fn from_specifier(spec: &[u8]) -> Result<Self> {
        if spec == ED25519_SPECIFIER {
            Ok(SignatureAlgorithm::Ed25519)
        } else {
            let tag = String::from_utf8_lossy(spec);
            Err(ShardError::InvalidKey(format!(
                "unsupported algorithm {:?}",
                tag.trim_end_matches('\0')
            )))
        }
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = ShardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            ED25519_PREFIX => Ok(SignatureAlgorithm::Ed25519),
            other => Err(ShardError::InvalidKey(format!(
                "unsupported algorithm {:?}",
                other
            ))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HOST PUBLIC KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// Public key identifying a storage host.
///
/// The text form is `ed25519:<64 hex chars>`, which is also the `{pubkey}`
/// path segment of the index protocol.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostPublicKey {
    algorithm: SignatureAlgorithm,
    key: [u8; ED25519_PUBLIC_KEY_SIZE],
}

impl HostPublicKey {
    /// Creates an Ed25519 host key from its 32 raw bytes.
    pub fn ed25519(key: [u8; ED25519_PUBLIC_KEY_SIZE]) -> Self {
        Self {
            algorithm: SignatureAlgorithm::Ed25519,
            key,
        }
    }

    /// Creates a host key from an algorithm and raw key bytes.
    ///
    /// # Errors
    /// Returns error if the key length does not match the algorithm.
    pub fn from_bytes(algorithm: SignatureAlgorithm, bytes: &[u8]) -> Result<Self> {
        let key: [u8; ED25519_PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|_| {
            ShardError::InvalidKey(format!(
                "expected {} key bytes, got {}",
                ED25519_PUBLIC_KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self { algorithm, key })
    }

    /// Returns the signature algorithm of the key.
    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; ED25519_PUBLIC_KEY_SIZE] {
        &self.key
    }

    /// Returns the hex-encoded key without the algorithm prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.key)
    }
}

impl fmt::Display for HostPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.as_str(), self.to_hex())
    }
}

impl fmt::Debug for HostPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only show the first 8 bytes for readability
        write!(
            f,
            "HostPublicKey({}:{}...)",
            self.algorithm.as_str(),
            hex::encode(&self.key[..8])
        )
    }
}

impl FromStr for HostPublicKey {
    type Err = ShardError;

    fn from_str(s: &str) -> Result<Self> {
        let (algorithm, key_hex) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| ShardError::InvalidKey(format!("missing algorithm prefix in {:?}", s)))?;
        let algorithm: SignatureAlgorithm = algorithm.parse()?;
        let bytes = hex::decode(key_hex)?;
        Self::from_bytes(algorithm, &bytes)
    }
}

impl Serialize for HostPublicKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HostPublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIGNATURE
// ═══════════════════════════════════════════════════════════════════════════════

/// Detached signature over an announcement's content hash.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; SIGNATURE_SIZE]);

impl Signature {
    /// Creates a signature from a byte slice.
    ///
    /// # Errors
    /// Returns error if the slice is not exactly 64 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; SIGNATURE_SIZE] = bytes.try_into().map_err(|_| {
            ShardError::Protocol(format!(
                "signature must be {} bytes, got {}",
                SIGNATURE_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", hex::encode(&self.0[..8]))
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Self::from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}
