//! Event classification and dispatch.
//!
//! [`Dispatcher::dispatch`] is the per-event failure boundary: handlers
//! return explicit results, and a panic inside a handler is caught here so
//! that one bad event never ends the stream.

use crate::counters::InternalErrors;
use crate::tracker::PositionTracker;
use chrono::Utc;
use futures_util::FutureExt;
use rowcache_core::{
    build_key, CacheInvalidator, ChangeEvent, EventCategory, InvalidationError, InvalidationKey,
    InvalidationResult, SqlValue,
};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Routes change events to the cache and the position tracker.
#[derive(Clone)]
pub struct Dispatcher {
    cache: Arc<dyn CacheInvalidator>,
    tracker: Arc<PositionTracker>,
    lag_seconds: Arc<AtomicI64>,
    errors: InternalErrors,
}

impl Dispatcher {
    pub fn new(
        cache: Arc<dyn CacheInvalidator>,
        tracker: Arc<PositionTracker>,
        lag_seconds: Arc<AtomicI64>,
        errors: InternalErrors,
    ) -> Self {
        Self {
            cache,
            tracker,
            lag_seconds,
            errors,
        }
    }

    /// Apply one event. Never fails and never panics.
    ///
    /// Once the event is handled the lag gauge is set to the seconds elapsed
    /// since its commit time. A DML event with an undecodable key still counts
    /// as handled. Other failures are logged with the event, counted, and
    /// leave the lag untouched.
    pub async fn dispatch(&self, event: &ChangeEvent) {
        match AssertUnwindSafe(self.process(event)).catch_unwind().await {
            Ok(Ok(())) => {
                let lag = Utc::now().timestamp() - event.timestamp;
                self.lag_seconds.store(lag, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, event = ?event, "Event invalidation failed");
                self.errors.add_invalidation();
            }
            Err(payload) => {
                tracing::error!(
                    panic = %panic_message(payload.as_ref()),
                    event = ?event,
                    "Uncaught panic while dispatching event"
                );
                self.errors.add_panic();
            }
        }
    }

    async fn process(&self, event: &ChangeEvent) -> InvalidationResult<()> {
        match &event.category {
            EventCategory::Ddl => {
                tracing::info!(sql = %event.sql, "DDL invalidation");
                self.cache.invalidate_for_ddl(&event.sql).await
            }
            EventCategory::Dml => self.handle_dml(event).await,
            EventCategory::Error => self.cache.invalidate_for_unrecognized(&event.sql).await,
            EventCategory::Position => {
                let position = event.position.ok_or(InvalidationError::MissingPosition)?;
                self.tracker.set(position);
                Ok(())
            }
            EventCategory::Unknown(tag) => Err(InvalidationError::UnknownCategory {
                category: tag.clone(),
            }),
        }
    }

    /// Invalidate every row of a DML event.
    ///
    /// A value that fails to decode drops the whole event: it is logged and
    /// counted here, no row is invalidated, and the event is still treated as
    /// handled.
    async fn handle_dml(&self, event: &ChangeEvent) -> InvalidationResult<()> {
        let keys = match dml_keys(event) {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!(error = %e, event = ?event, "Error building invalidation key");
                self.errors.add_invalidation();
                return Ok(());
            }
        };

        self.cache.invalidate_for_dml(&event.table_name, &keys).await
    }
}

/// Keys for every row of a DML event, in row order. Rows without a usable
/// key are skipped; the first undecodable value fails the whole event.
fn dml_keys(event: &ChangeEvent) -> InvalidationResult<Vec<InvalidationKey>> {
    let mut keys = Vec::with_capacity(event.pk_rows.len());
    let mut values = Vec::new();

    for tuple in &event.pk_rows {
        values.clear();
        for raw in tuple {
            let value = SqlValue::build(raw).map_err(|source| InvalidationError::KeyDecode {
                table: event.table_name.clone(),
                source,
            })?;
            values.push(value);
        }
        if let Some(key) = build_key(&values) {
            keys.push(key);
        }
    }
    Ok(keys)
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
