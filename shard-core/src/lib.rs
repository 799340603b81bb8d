//! # SHARD Core
//!
//! Core types, errors, and traits for the SHARD host-discovery index.
//!
//! This crate provides the foundational building blocks used by all other SHARD crates:
//!
//! - **Types**: Host keys, network addresses, announcements, chain events
//! - **Errors**: One error taxonomy shared by the index, the server and both resolvers
//! - **Constants**: Wire format specifiers and sizes
//! - **Traits**: The store, index-reader and resolver capabilities
//!
//! ## Example
//!
//! ```rust
//! use shard_core::{HostPublicKey, NetAddress};
//!
//! let key: HostPublicKey = format!("ed25519:{}", "ab".repeat(32)).parse().unwrap();
//! let addr = NetAddress::parse("host.example.com:9982").unwrap();
//! assert_eq!(addr.port(), 9982);
//! assert!(key.to_string().starts_with("ed25519:"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{ErrorKind, Result, ShardError};
pub use traits::*;
pub use types::*;
