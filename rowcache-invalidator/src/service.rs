//! The invalidation service.
//!
//! [`RowcacheInvalidator`] owns the lifecycle of a single background worker
//! that tails the replication stream and feeds every event to the
//! [`Dispatcher`]. The worker retries forever on stream errors, resuming from
//! the last tracked position, and exits only when [`close`] is called or the
//! stream ends cleanly.
//!
//! # Locking
//!
//! Session identity (db name, source, stream session, worker handle, state)
//! sits behind one mutex that is never held across an await. The replication
//! position has its own reader-writer lock in [`PositionTracker`] so that
//! status polling never contends with lifecycle calls.
//!
//! [`close`]: RowcacheInvalidator::close

use crate::counters::InternalErrors;
use crate::dispatch::{panic_message, Dispatcher};
use crate::tracker::PositionTracker;
use futures_util::{FutureExt, StreamExt};
use rowcache_core::{
    CacheInvalidator, EventStreamer, InvalidatorConfig, ReplicationPosition, ReplicationSource,
    RowcacheResult, StreamError,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

// ============================================================================
// SERVICE STATE
// ============================================================================

/// Lifecycle state of the invalidator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ServiceState {
    #[default]
    Stopped,
    Running,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Stopped => "Stopped",
            ServiceState::Running => "Running",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything guarded by the session lock.
#[derive(Default)]
struct Session {
    state: ServiceState,
    db_name: Option<String>,
    source: Option<Arc<dyn ReplicationSource>>,
    streamer: Option<Arc<dyn EventStreamer>>,
    shutdown: Option<watch::Sender<bool>>,
    /// Flips to `true` once the worker has cleared this session.
    stopped: Option<watch::Receiver<bool>>,
    worker: Option<JoinHandle<()>>,
}

impl Session {
    fn clear(&mut self) {
        *self = Session::default();
    }
}

struct Shared {
    config: InvalidatorConfig,
    session: Mutex<Session>,
    tracker: Arc<PositionTracker>,
    lag_seconds: Arc<AtomicI64>,
    errors: InternalErrors,
    dispatcher: Dispatcher,
}

impl Shared {
    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// INVALIDATOR
// ============================================================================

/// Binlog-driven row cache invalidator.
///
/// Constructed once by the owning process and shared by cloning; every clone
/// refers to the same service.
#[derive(Clone)]
pub struct RowcacheInvalidator {
    shared: Arc<Shared>,
}

impl RowcacheInvalidator {
    /// Create a stopped invalidator with its own error counters.
    pub fn new(cache: Arc<dyn CacheInvalidator>, config: InvalidatorConfig) -> Self {
        Self::with_errors(cache, config, InternalErrors::new())
    }

    /// Create a stopped invalidator counting into process-wide `errors`.
    pub fn with_errors(
        cache: Arc<dyn CacheInvalidator>,
        config: InvalidatorConfig,
        errors: InternalErrors,
    ) -> Self {
        let tracker = Arc::new(PositionTracker::new());
        let lag_seconds = Arc::new(AtomicI64::new(0));
        let dispatcher = Dispatcher::new(
            cache,
            Arc::clone(&tracker),
            Arc::clone(&lag_seconds),
            errors.clone(),
        );

        Self {
            shared: Arc::new(Shared {
                config,
                session: Mutex::new(Session::default()),
                tracker,
                lag_seconds,
                errors,
                dispatcher,
            }),
        }
    }

    /// Start invalidating from `source`'s current position.
    ///
    /// A no-op when already running. Fails without starting anything when the
    /// source cannot report its replication position or lacks required
    /// configuration. Returns as soon as the worker is spawned.
    pub async fn open(&self, db_name: &str, source: Arc<dyn ReplicationSource>) -> RowcacheResult<()> {
        if self.state() == ServiceState::Running {
            tracing::info!("Rowcache invalidator already running");
            return Ok(());
        }

        let status = source.master_status().await.map_err(|e| {
            tracing::error!(error = %e, "Rowcache invalidator aborting: cannot determine replication position");
            e
        })?;
        source.config().validate().map_err(|e| {
            tracing::error!(error = %e, "Rowcache invalidator aborting: binlog path not specified");
            e
        })?;

        let mut session = self.shared.lock_session();
        if session.state == ServiceState::Running {
            tracing::info!("Rowcache invalidator already running");
            return Ok(());
        }

        let streamer = source.event_streamer(db_name);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (stopped_tx, stopped_rx) = watch::channel(false);
        self.shared.tracker.set(status.position);

        tracing::info!(
            db_name,
            binlog_path = source.config().binlog_path.as_deref().unwrap_or_default(),
            log_file = %status.log_file,
            log_position = status.log_position,
            position = %status.position,
            "Rowcache invalidator starting"
        );

        session.state = ServiceState::Running;
        session.db_name = Some(db_name.to_string());
        session.source = Some(source);
        session.streamer = Some(Arc::clone(&streamer));
        session.shutdown = Some(shutdown_tx);
        session.stopped = Some(stopped_rx);
        session.worker = Some(tokio::spawn(run(
            Arc::clone(&self.shared),
            streamer,
            shutdown_rx,
            stopped_tx,
        )));
        Ok(())
    }

    /// Stop invalidating and wait for the worker to exit.
    ///
    /// A no-op when not running. When this returns the service is stopped and
    /// may be opened again, including for callers racing another `close`.
    pub async fn close(&self) {
        let (worker, stopped) = {
            let mut session = self.shared.lock_session();
            if session.state != ServiceState::Running {
                tracing::info!("Rowcache invalidator is not running");
                return;
            }
            // Ends the in-flight stream; the worker may still be mid-iteration
            // and needs the session lock to clear itself, so the lock is
            // released before waiting.
            if let Some(streamer) = &session.streamer {
                streamer.stop();
            }
            if let Some(shutdown) = &session.shutdown {
                shutdown.send_replace(true);
            }
            (session.worker.take(), session.stopped.clone())
        };

        match (worker, stopped) {
            (Some(worker), _) => {
                if let Err(e) = worker.await {
                    tracing::error!(error = %e, "Rowcache invalidator worker ended abnormally");
                    self.shared.errors.add_panic();
                }
            }
            // Another close holds the worker handle; wait for the same exit.
            (None, Some(mut stopped)) => {
                let _ = stopped.wait_for(|done| *done).await;
            }
            (None, None) => {}
        }
    }

    pub fn state(&self) -> ServiceState {
        self.shared.lock_session().state
    }

    /// Database being tailed while running.
    pub fn db_name(&self) -> Option<String> {
        self.shared.lock_session().db_name.clone()
    }

    pub fn current_position(&self) -> Option<ReplicationPosition> {
        self.shared.tracker.get()
    }

    /// Current position for status output, `"<nil>"` when unset.
    pub fn current_position_text(&self) -> String {
        self.shared.tracker.text()
    }

    /// Seconds between the last dispatched event's commit and its processing.
    pub fn lag_seconds(&self) -> i64 {
        self.shared.lag_seconds.load(Ordering::Relaxed)
    }

    pub fn internal_errors(&self) -> InternalErrors {
        self.shared.errors.clone()
    }

    pub fn config(&self) -> &InvalidatorConfig {
        &self.shared.config
    }
}

// ============================================================================
// WORKER
// ============================================================================

/// Clears the session and signals waiters when the worker exits, whether it
/// returns, panics, or is cancelled with its runtime.
struct ExitGuard {
    shared: Arc<Shared>,
    stopped: watch::Sender<bool>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.shared.lock_session().clear();
        self.stopped.send_replace(true);
        tracing::info!("Rowcache invalidator stopped");
    }
}

/// Retry loop: stream, and on any error log, back off, and resume from the
/// last tracked position. Only a clean end of stream or shutdown exits.
async fn run(
    shared: Arc<Shared>,
    streamer: Arc<dyn EventStreamer>,
    mut shutdown: watch::Receiver<bool>,
    stopped: watch::Sender<bool>,
) {
    let _exit = ExitGuard {
        shared: Arc::clone(&shared),
        stopped,
    };

    loop {
        let result = AssertUnwindSafe(stream_once(&shared, streamer.as_ref()))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(StreamError::Panic {
                    message: panic_message(payload.as_ref()),
                })
            });

        let Err(e) = result else {
            break;
        };

        tracing::error!(
            error = %e,
            retry_in_ms = shared.config.retry_backoff.as_millis() as u64,
            "Event stream returned error, retrying"
        );
        match e {
            StreamError::Panic { .. } => shared.errors.add_panic(),
            _ => shared.errors.add_invalidation(),
        }

        tokio::select! {
            _ = tokio::time::sleep(shared.config.retry_backoff) => {}
            _ = shutdown.changed() => {}
        }
        if *shutdown.borrow() {
            break;
        }
    }
}

/// One streaming call, starting after the last tracked position.
async fn stream_once(shared: &Shared, streamer: &dyn EventStreamer) -> Result<(), StreamError> {
    let mut events = streamer.stream(shared.tracker.get()).await?;
    while let Some(event) = events.next().await {
        shared.dispatcher.dispatch(&event?).await;
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
