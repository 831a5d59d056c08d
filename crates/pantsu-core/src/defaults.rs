//! Centralized default constants for pantsu-booru.
//!
//! Configuration falls back to these values when the matching environment
//! variable is unset.

// =============================================================================
// SEARCH
// =============================================================================

/// Maximum number of images returned by a tag search.
pub const SEARCH_LIMIT: usize = 100;

// =============================================================================
// TAGS
// =============================================================================

/// Maximum tag length in characters.
pub const MAX_TAG_LENGTH: usize = 100;

// =============================================================================
// DATABASE
// =============================================================================

/// Database URL used when `DATABASE_URL` is unset.
pub const DATABASE_URL: &str = "sqlite://pantsu.db?mode=rwc";

/// Maximum number of pooled connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Minimum number of pooled connections kept open.
pub const DB_MIN_CONNECTIONS: u32 = 1;

/// Seconds to wait for a pooled connection.
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Seconds an idle connection may stay in the pool.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;

/// Maximum connection lifetime in seconds.
pub const DB_MAX_LIFETIME_SECS: u64 = 1800;

/// Bind parameters per batched statement. SQLite rejects statements above
/// its variable limit (32 766 by default).
pub const DB_BIND_CHUNK: usize = 10_000;

// =============================================================================
// LOGGING
// =============================================================================

/// Env filter used when `RUST_LOG` is unset.
pub const LOG_FILTER: &str = "pantsu_db=info,pantsu_core=info";
