//! Collaborator traits consumed by the invalidator.
//!
//! The replication source and the cache engine live outside this workspace.
//! These traits are the whole contract the invalidator relies on.

use crate::{
    ChangeEvent, InvalidationKey, InvalidationResult, MasterStatus, ReplicationPosition,
    SourceConfig, SourceError, StreamError,
};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::sync::Arc;

/// Ordered stream of change events for one streaming call.
pub type EventStream = BoxStream<'static, Result<ChangeEvent, StreamError>>;

/// Handle to the upstream database whose changes are tailed.
#[async_trait]
pub trait ReplicationSource: Send + Sync {
    /// Source settings, checked before the invalidator starts.
    fn config(&self) -> &SourceConfig;

    /// Query the current replication status.
    ///
    /// Implementations must bound this call with their own timeout.
    async fn master_status(&self) -> Result<MasterStatus, SourceError>;

    /// Create a new streaming session for `db_name`.
    fn event_streamer(&self, db_name: &str) -> Arc<dyn EventStreamer>;
}

/// One streaming session against the replication source.
#[async_trait]
pub trait EventStreamer: Send + Sync {
    /// Start streaming events committed after `start`.
    ///
    /// `start` is `None` only when no position has ever been recorded.
    /// The returned stream ends (yields `None`) only after [`stop`] was
    /// called; any other termination is reported as an `Err` item or an
    /// `Err` from this call.
    ///
    /// [`stop`]: EventStreamer::stop
    async fn stream(&self, start: Option<ReplicationPosition>) -> Result<EventStream, StreamError>;

    /// Ask the session to stop.
    ///
    /// Idempotent. Makes an in-flight stream end promptly, and any stream
    /// opened afterwards on this session end immediately.
    fn stop(&self);
}

/// Cache engine receiving invalidation commands.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Invalidate everything a schema-changing statement may affect.
    async fn invalidate_for_ddl(&self, sql: &str) -> InvalidationResult<()>;

    /// Invalidate the rows of `table` identified by `keys`.
    async fn invalidate_for_dml(&self, table: &str, keys: &[InvalidationKey]) -> InvalidationResult<()>;

    /// Invalidate broadly for a statement the stream could not represent.
    async fn invalidate_for_unrecognized(&self, sql: &str) -> InvalidationResult<()>;
}
