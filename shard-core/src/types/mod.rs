//! Domain types for SHARD.
//!
//! - [`HostPublicKey`]: Index key identifying a host
//! - [`NetAddress`]: Validated `host:port`
//! - [`HostAnnouncement`] / [`AnnouncementRecord`]: Signed announcement and its stored form
//! - [`Block`] / [`ChainEvent`]: What the chain observer delivers
//! - [`IndexState`]: Height and synced flag of the index

mod keys;
mod address;
mod announcement;
mod chain;

pub use keys::*;
pub use address::*;
pub use announcement::*;
pub use chain::*;
