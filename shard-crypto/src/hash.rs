//! BLAKE2b-256 hashing.
//!
//! The content hash of an announcement is the BLAKE2b-256 digest of its exact
//! encoded bytes. Signatures are made over this digest, so two parties that
//! agree on the bytes agree on the hash.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

use shard_core::constants::HASH_SIZE;

type Blake2b256 = Blake2b<U32>;

/// Computes the BLAKE2b-256 digest of `input`.
pub fn blake2b256(input: &[u8]) -> [u8; HASH_SIZE] {
    let mut hasher = Blake2b256::new();
    hasher.update(input);
    hasher.finalize().into()
}

/// Computes the content hash of an encoded announcement.
pub fn hash_announcement(encoded: &[u8]) -> [u8; HASH_SIZE] {
    blake2b256(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake2b256_empty_vector() {
        // Known test vector for BLAKE2b-256("")
        let expected =
            hex::decode("0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8")
                .unwrap();
        assert_eq!(blake2b256(b"").as_slice(), expected.as_slice());
    }

    #[test]
    fn test_blake2b256_deterministic() {
        assert_eq!(blake2b256(b"input"), blake2b256(b"input"));
        assert_ne!(blake2b256(b"input"), blake2b256(b"input2"));
    }
}
