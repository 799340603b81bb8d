//! Error types for SHARD.
//!
//! One `thiserror` hierarchy covers the indexer, the store, the index server
//! and both resolver backends. Callers that need to branch on an outcome
//! should use [`ShardError::kind`] rather than inspecting messages.

use thiserror::Error;

/// Result type alias using `ShardError`.
pub type Result<T> = std::result::Result<T, ShardError>;

/// Coarse classification of a [`ShardError`].
///
/// Both resolver backends report a missing announcement as
/// [`ErrorKind::NotFound`], so backend choice is invisible to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No announcement is known for the requested key.
    NotFound,
    /// A response decoded but its signature did not verify.
    InvalidSignature,
    /// A response or stored blob did not follow the expected encoding.
    Protocol,
    /// Network failure, timeout, or a non-success status from a remote.
    Transport,
    /// Local storage could not be read or written.
    Persistence,
    /// Chain events arrived out of order.
    Chain,
    /// Caller-supplied input was malformed.
    Invalid,
    /// Internal invariant violation or misconfiguration.
    Internal,
}

/// Main error type for all SHARD operations.
#[derive(Debug, Error)]
pub enum ShardError {
    // ═══════════════════════════════════════════════════════════════════════════
    // LOOKUP ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// No announcement exists for the requested host key.
    #[error("host announcement not found")]
    NoAnnouncement,

    /// The announcement signature does not verify under the requested key.
    #[error("invalid signature")]
    InvalidSignature,

    // ═══════════════════════════════════════════════════════════════════════════
    // ENCODING ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Malformed response or record encoding.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Malformed announcement payload.
    #[error("Invalid announcement: {0}")]
    InvalidAnnouncement(String),

    /// Malformed host public key.
    #[error("Invalid host key: {0}")]
    InvalidKey(String),

    /// Malformed network address.
    #[error("Invalid network address: {0}")]
    InvalidNetAddress(String),

    /// Transaction set rejected before submission.
    #[error("Invalid transaction set: {0}")]
    InvalidTransaction(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid hex encoding.
    #[error("Invalid hex encoding: {0}")]
    HexError(#[from] hex::FromHexError),

    // ═══════════════════════════════════════════════════════════════════════════
    // NETWORK ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Connection or request failure.
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// The request did not complete before its deadline.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The index server answered with a non-success status.
    ///
    /// `message` is the raw error body sent by the server.
    #[error("{message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Raw error text from the response body
        message: String,
    },

    /// The full node answered with a non-success status.
    #[error("node API error ({status}): {message}")]
    Node {
        /// HTTP status code
        status: u16,
        /// Error message reported by the node
        message: String,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Writing or loading the announcement store failed.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Persisted file format version mismatch.
    #[error("Store version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Version this build writes
        expected: u8,
        /// Version found on disk
        actual: u8,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // CHAIN ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// A block arrived ahead of the next expected height.
    #[error("Chain gap: expected block {expected}, got {actual}")]
    ChainGap {
        /// Next height the index can accept
        expected: u64,
        /// Height of the delivered block
        actual: u64,
    },

    /// A revert did not target the current tip.
    #[error("Invalid revert: tip is block {tip}, got {actual}")]
    InvalidRevert {
        /// Height of the current tip block
        tip: u64,
        /// Height of the block asked to be reverted
        actual: u64,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ShardError {
    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShardError::NoAnnouncement => ErrorKind::NotFound,
            ShardError::InvalidSignature => ErrorKind::InvalidSignature,
            ShardError::Protocol(_) | ShardError::JsonError(_) => ErrorKind::Protocol,
            ShardError::InvalidAnnouncement(_)
            | ShardError::InvalidKey(_)
            | ShardError::InvalidNetAddress(_)
            | ShardError::InvalidTransaction(_)
            | ShardError::HexError(_) => ErrorKind::Invalid,
            ShardError::Transport(_)
            | ShardError::Timeout(_)
            | ShardError::Server { .. }
            | ShardError::Node { .. } => ErrorKind::Transport,
            ShardError::Persistence(_)
            | ShardError::IoError(_)
            | ShardError::VersionMismatch { .. } => ErrorKind::Persistence,
            ShardError::ChainGap { .. } | ShardError::InvalidRevert { .. } => ErrorKind::Chain,
            ShardError::ConfigError(_) | ShardError::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if no announcement exists for the requested key.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Returns true if this error is recoverable (the caller may retry).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ShardError::Transport(_) | ShardError::Timeout(_)
        ) || matches!(self, ShardError::Server { status, .. } | ShardError::Node { status, .. } if *status >= 500)
    }

    /// Returns true if the error means the local index can no longer be trusted
    /// to be durable, and the process should stop.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Persistence
    }
}
