//! Rowcache Core - Types and Collaborator Traits
//!
//! Data structures shared by the invalidator and its collaborators: change
//! events, replication positions, column values, invalidation keys, errors,
//! and the traits describing the replication source and the cache engine.

pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod key;
pub mod position;
pub mod traits;
pub mod value;

pub use config::{InvalidatorConfig, SourceConfig};
pub use error::{
    ConfigError, DecodeError, InvalidationError, InvalidationResult, PositionError,
    RowcacheError, RowcacheResult, SourceError, StreamError,
};
pub use event::{ChangeEvent, EventCategory};
pub use key::{build_key, InvalidationKey, KEY_SEPARATOR};
pub use position::{GtidFlavor, MasterStatus, ReplicationPosition};
pub use traits::{CacheInvalidator, EventStream, EventStreamer, ReplicationSource};
pub use value::{ColumnKind, RawValue, SqlValue};
