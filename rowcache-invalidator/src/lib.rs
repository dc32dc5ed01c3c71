//! Rowcache Invalidator - Binlog-Driven Cache Invalidation
//!
//! Tails a database's replication stream and invalidates row cache entries
//! affected by each committed change:
//!
//! - DDL statements invalidate broadly by SQL text
//! - DML row changes invalidate per primary key
//! - Statements the stream could not parse invalidate conservatively
//! - Position events advance the resume point used after stream failures
//!
//! # Example
//!
//! ```ignore
//! let invalidator = RowcacheInvalidator::new(cache, InvalidatorConfig::from_env());
//! register_invalidator_metrics(&registry, &invalidator)?;
//! invalidator.open("vt_commerce", source).await?;
//! // ...
//! invalidator.close().await;
//! ```

pub mod counters;
pub mod dispatch;
pub mod metrics;
pub mod service;
pub mod telemetry;
pub mod tracker;

pub use counters::{InternalErrors, InternalErrorsSnapshot};
pub use dispatch::Dispatcher;
pub use metrics::{register_invalidator_metrics, StatusCollector};
pub use service::{RowcacheInvalidator, ServiceState};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig, TelemetryError};
pub use tracker::PositionTracker;

pub use rowcache_core::{
    build_key, CacheInvalidator, ChangeEvent, EventCategory, EventStreamer, InvalidationKey,
    InvalidatorConfig, ReplicationPosition, ReplicationSource, RowcacheError, RowcacheResult,
    SourceConfig,
};
