//! Error types for rowcache operations

use crate::ColumnKind;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },
}

/// Errors produced while decoding a raw column value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid {kind:?} value {value:?}: {reason}")]
    InvalidNumber {
        kind: ColumnKind,
        value: String,
        reason: String,
    },

    #[error("Non-finite float value {value:?}")]
    NonFinite { value: String },

    #[error("Invalid decimal literal {value:?}")]
    InvalidDecimal { value: String },

    #[error("Invalid UTF-8 in {kind:?} column: {reason}")]
    InvalidUtf8 { kind: ColumnKind, reason: String },
}

/// Replication position parsing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PositionError {
    #[error("Malformed {flavor} GTID {text:?}: {reason}")]
    Malformed {
        flavor: String,
        text: String,
        reason: String,
    },
}

/// Errors reported by the replication source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Cannot determine replication position: {reason}")]
    MasterStatus { reason: String },

    #[error("Replication source unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Recognized application errors raised while handling a single event.
///
/// These are contained at the dispatch boundary: logged with the event,
/// counted, and never allowed to stop the stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidationError {
    #[error("Error building invalidation key for table {table}: {source}")]
    KeyDecode {
        table: String,
        #[source]
        source: DecodeError,
    },

    #[error("Cache invalidation failed: {reason}")]
    Cache { reason: String },

    #[error("Unknown event category: {category}")]
    UnknownCategory { category: String },

    #[error("Position event carries no position")]
    MissingPosition,
}

/// Loop-level errors from one streaming session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    /// The streaming call could not start.
    #[error("Stream failed: {reason}")]
    Failed { reason: String },

    /// The stream broke after it started.
    #[error("Stream interrupted: {reason}")]
    Interrupted { reason: String },

    #[error("Uncaught panic: {message}")]
    Panic { message: String },
}

/// Master error type for all rowcache errors.
#[derive(Debug, Clone, Error)]
pub enum RowcacheError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Position error: {0}")]
    Position(#[from] PositionError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Invalidation error: {0}")]
    Invalidation(#[from] InvalidationError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
}

/// Result type alias for rowcache operations.
pub type RowcacheResult<T> = Result<T, RowcacheError>;

/// Result type alias for event handling.
pub type InvalidationResult<T> = Result<T, InvalidationError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display_missing_required() {
        let err = ConfigError::MissingRequired {
            field: "binlog_path".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Missing required"));
        assert!(msg.contains("binlog_path"));
    }

    #[test]
    fn test_decode_error_display_invalid_number() {
        let err = DecodeError::InvalidNumber {
            kind: ColumnKind::Int,
            value: "12x".to_string(),
            reason: "invalid digit found in string".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Int"));
        assert!(msg.contains("12x"));
    }

    #[test]
    fn test_invalidation_error_keeps_decode_source() {
        let err = InvalidationError::KeyDecode {
            table: "users".to_string(),
            source: DecodeError::InvalidDecimal {
                value: "1.2.3".to_string(),
            },
        };
        let msg = format!("{}", err);
        assert!(msg.contains("users"));
        assert!(msg.contains("1.2.3"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_stream_error_display_panic() {
        let err = StreamError::Panic {
            message: "boom".to_string(),
        };
        assert_eq!(format!("{}", err), "Uncaught panic: boom");
    }

    #[test]
    fn test_rowcache_error_from_variants() {
        let config = RowcacheError::from(ConfigError::MissingRequired {
            field: "binlog_path".to_string(),
        });
        assert!(matches!(config, RowcacheError::Config(_)));

        let source = RowcacheError::from(SourceError::MasterStatus {
            reason: "connection refused".to_string(),
        });
        assert!(matches!(source, RowcacheError::Source(_)));

        let invalidation = RowcacheError::from(InvalidationError::MissingPosition);
        assert!(matches!(invalidation, RowcacheError::Invalidation(_)));

        let stream = RowcacheError::from(StreamError::Interrupted {
            reason: "reset".to_string(),
        });
        assert!(matches!(stream, RowcacheError::Stream(_)));
    }
}
