//! Ed25519 host keys, announcement signing and verification.
//!
//! The canonical pattern: encode the announcement, hash the bytes with
//! BLAKE2b-256, sign the 32-byte digest. Verification repeats the same steps
//! on the stored bytes, so nothing is reparsed before checking.

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use shard_core::constants::{ED25519_SECRET_KEY_SIZE, HASH_SIZE};
use shard_core::error::{Result, ShardError};
use shard_core::types::{
    AnnouncementRecord, HostAnnouncement, HostPublicKey, NetAddress, Signature, SignatureAlgorithm,
};

use crate::hash::hash_announcement;

// ═══════════════════════════════════════════════════════════════════════════════
// KEYS
// ═══════════════════════════════════════════════════════════════════════════════

/// Generates a fresh host signing key from the OS CSPRNG.
pub fn generate_host_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Returns the host public key of a signing key.
pub fn host_public_key(signing_key: &SigningKey) -> HostPublicKey {
    HostPublicKey::ed25519(signing_key.verifying_key().to_bytes())
}

/// Parses a 32-byte hex-encoded signing key seed.
pub fn signing_key_from_hex(s: &str) -> Result<SigningKey> {
    let bytes = Zeroizing::new(hex::decode(s.trim())?);
    let seed: &[u8; ED25519_SECRET_KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
        ShardError::InvalidKey(format!(
            "expected {} secret key bytes, got {}",
            ED25519_SECRET_KEY_SIZE,
            bytes.len()
        ))
    })?;
    Ok(SigningKey::from_bytes(seed))
}

fn verifying_key(key: &HostPublicKey) -> Result<VerifyingKey> {
    match key.algorithm() {
        SignatureAlgorithm::Ed25519 => VerifyingKey::from_bytes(key.as_bytes())
            .map_err(|_| ShardError::InvalidKey("not a valid Ed25519 point".into())),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIGNING
// ═══════════════════════════════════════════════════════════════════════════════

/// Builds and signs an announcement of `net_address` for the given host key.
pub fn sign_announcement(signing_key: &SigningKey, net_address: NetAddress) -> AnnouncementRecord {
    use ed25519_dalek::Signer;

    let announcement = HostAnnouncement::new(net_address, host_public_key(signing_key));
    let encoded = announcement.to_bytes();
    let hash = hash_announcement(&encoded);
    let signature = signing_key.sign(&hash);

    AnnouncementRecord::new(encoded, Signature(signature.to_bytes()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// VERIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Verifies a signature over a content hash.
///
/// A key that is not a valid curve point cannot have produced any signature,
/// so it also yields [`ShardError::InvalidSignature`].
pub fn verify_signature(
    key: &HostPublicKey,
    hash: &[u8; HASH_SIZE],
    signature: &Signature,
) -> Result<()> {
    let vk = verifying_key(key).map_err(|_| ShardError::InvalidSignature)?;
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    vk.verify_strict(hash, &sig)
        .map_err(|_| ShardError::InvalidSignature)
}

/// Decodes a record and verifies it was signed by `key`.
///
/// Fails with [`ShardError::InvalidAnnouncement`] if the announcement does not
/// decode, and with [`ShardError::InvalidSignature`] if the signature does not
/// verify under `key` or the announcement names a different key.
pub fn verify_record(record: &AnnouncementRecord, key: &HostPublicKey) -> Result<HostAnnouncement> {
    let announcement = record.decode()?;

    let hash = hash_announcement(&record.announcement);
    verify_signature(key, &hash, &record.signature)?;

    if announcement.public_key != *key {
        return Err(ShardError::InvalidSignature);
    }

    Ok(announcement)
}
