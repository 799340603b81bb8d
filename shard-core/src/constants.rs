//! Protocol constants for SHARD.
//!
//! Sizes follow Ed25519 and BLAKE2b-256; specifiers are the fixed 16-byte
//! tags used in the announcement encoding.

// ═══════════════════════════════════════════════════════════════════════════════
// KEY AND SIGNATURE SIZES
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of an Ed25519 verifying key in bytes.
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of an Ed25519 signing key seed in bytes.
pub const ED25519_SECRET_KEY_SIZE: usize = 32;

/// Size of an Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Size of the announcement content hash (BLAKE2b-256).
pub const HASH_SIZE: usize = 32;

// ═══════════════════════════════════════════════════════════════════════════════
// SPECIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of a specifier tag in the binary encoding.
pub const SPECIFIER_SIZE: usize = 16;

/// Leading tag of every encoded host announcement.
pub const ANNOUNCEMENT_SPECIFIER: [u8; SPECIFIER_SIZE] = *b"HostAnnouncement";

/// Algorithm tag for Ed25519 keys, zero-padded.
pub const ED25519_SPECIFIER: [u8; SPECIFIER_SIZE] = *b"ed25519\0\0\0\0\0\0\0\0\0";

/// Textual algorithm prefix used in the `algorithm:hex` key form.
pub const ED25519_PREFIX: &str = "ed25519";

// ═══════════════════════════════════════════════════════════════════════════════
// LIMITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Longest network address accepted when decoding untrusted announcements.
pub const MAX_NET_ADDRESS_LEN: usize = 256;

/// Smallest possible encoded announcement (empty address, 32-byte key).
pub const MIN_ANNOUNCEMENT_SIZE: usize =
    SPECIFIER_SIZE + 8 + SPECIFIER_SIZE + 8 + ED25519_PUBLIC_KEY_SIZE;

/// Largest signed record an index server can legitimately return.
pub const MAX_RECORD_SIZE: usize = MIN_ANNOUNCEMENT_SIZE + MAX_NET_ADDRESS_LEN + SIGNATURE_SIZE;

/// Cap on short plain-text responses such as `/height` and `/synced`.
pub const MAX_SCALAR_BODY: usize = 32;

/// Bytes of an error body kept for the error message.
pub const MAX_ERROR_BODY: usize = 1024;

// ═══════════════════════════════════════════════════════════════════════════════
// NETWORK DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default listen address of the index server.
pub const DEFAULT_API_ADDR: &str = "0.0.0.0:8080";

/// Default deadline for a single client round-trip, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default deadline for reaching a host during a scan, in seconds.
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 10;

/// User agent expected by the full node API.
pub const NODE_USER_AGENT: &str = "Sia-Agent";
