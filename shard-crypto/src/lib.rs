//! # SHARD Cryptography
//!
//! Hashing and signature primitives for host announcements.
//!
//! This crate provides:
//!
//! - **Hash**: BLAKE2b-256 content hash of an encoded announcement
//! - **Sign**: Ed25519 host keys, announcement signing and verification
//!
//! ## Security Properties
//!
//! - Verification uses `verify_strict` (rejects small-order keys and
//!   non-canonical signatures)
//! - A record only verifies under the key embedded in its own announcement
//! - Secret key material parsed from hex is zeroized after use
//!
//! ## Example
//!
//! ```rust
//! use shard_core::NetAddress;
//! use shard_crypto::{generate_host_key, host_public_key, sign_announcement, verify_record};
//!
//! let key = generate_host_key();
//! let pubkey = host_public_key(&key);
//! let record = sign_announcement(&key, NetAddress::parse("host.example.com:9982").unwrap());
//!
//! let announcement = verify_record(&record, &pubkey).unwrap();
//! assert_eq!(announcement.net_address.as_str(), "host.example.com:9982");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod hash;
pub mod sign;

// Re-export main functions at crate root
pub use hash::{blake2b256, hash_announcement};
pub use sign::{
    generate_host_key, host_public_key, sign_announcement, signing_key_from_hex, verify_record,
    verify_signature,
};
pub use ed25519_dalek::SigningKey;
