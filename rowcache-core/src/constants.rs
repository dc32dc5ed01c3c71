//! Constants for rowcache
//!
//! Tunables shared by the invalidator and its configuration loaders.

// ============================================================================
// INVALIDATION LOOP
// ============================================================================

/// Default pause between stream retries in milliseconds (1 second)
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;

/// Environment variable overriding the retry backoff
pub const ENV_RETRY_BACKOFF_MS: &str = "ROWCACHE_RETRY_BACKOFF_MS";

// ============================================================================
// STATUS
// ============================================================================

/// Text reported for the position before any has been recorded
pub const NIL_POSITION_TEXT: &str = "<nil>";

/// Internal error counter category for recognized failures
pub const ERROR_CATEGORY_INVALIDATION: &str = "Invalidation";

/// Internal error counter category for caught panics
pub const ERROR_CATEGORY_PANIC: &str = "Panic";

// ============================================================================
// LOGGING
// ============================================================================

/// Environment variable selecting the log output format (`json` or `plain`)
pub const ENV_LOG_FORMAT: &str = "ROWCACHE_LOG_FORMAT";

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "rowcache_invalidator=info,info";
