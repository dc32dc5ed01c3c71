//! Rowcache Test Utilities
//!
//! Shared test infrastructure for the rowcache workspace:
//! - A scripted replication source that records every stream request
//! - A recording cache that captures invalidation calls
//! - Proptest generators for change events and column values
//! - Fixtures and async wait helpers

pub use rowcache_core::{
    build_key, CacheInvalidator, ChangeEvent, ColumnKind, EventCategory, EventStream,
    EventStreamer, InvalidationError, InvalidationKey, InvalidationResult, MasterStatus, RawValue,
    ReplicationPosition, ReplicationSource, SourceConfig, SourceError, SqlValue, StreamError,
};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// RECORDING CACHE
// ============================================================================

/// One invalidation call observed by [`RecordingCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheCall {
    Ddl(String),
    Dml { table: String, keys: Vec<String> },
    Unrecognized(String),
}

/// Cache double that records every invalidation call in order.
///
/// Individual tables can be configured to fail with a cache error or to
/// panic, to exercise the dispatcher's failure boundary.
#[derive(Debug, Default)]
pub struct RecordingCache {
    calls: Mutex<Vec<CacheCall>>,
    failing_tables: Mutex<Vec<String>>,
    panicking_tables: Mutex<Vec<String>>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make DML invalidation of `table` return a cache error.
    pub fn fail_table(&self, table: impl Into<String>) {
        lock(&self.failing_tables).push(table.into());
    }

    /// Make DML invalidation of `table` panic.
    pub fn panic_on_table(&self, table: impl Into<String>) {
        lock(&self.panicking_tables).push(table.into());
    }

    pub fn calls(&self) -> Vec<CacheCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    fn record(&self, call: CacheCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl CacheInvalidator for RecordingCache {
    async fn invalidate_for_ddl(&self, sql: &str) -> InvalidationResult<()> {
        self.record(CacheCall::Ddl(sql.to_string()));
        Ok(())
    }

    async fn invalidate_for_dml(&self, table: &str, keys: &[InvalidationKey]) -> InvalidationResult<()> {
        if lock(&self.panicking_tables).iter().any(|t| t == table) {
            panic!("cache engine crashed on table {}", table);
        }
        if lock(&self.failing_tables).iter().any(|t| t == table) {
            return Err(InvalidationError::Cache {
                reason: format!("table {} unavailable", table),
            });
        }
        self.record(CacheCall::Dml {
            table: table.to_string(),
            keys: keys.iter().map(|k| k.as_str().to_string()).collect(),
        });
        Ok(())
    }

    async fn invalidate_for_unrecognized(&self, sql: &str) -> InvalidationResult<()> {
        self.record(CacheCall::Unrecognized(sql.to_string()));
        Ok(())
    }
}

// ============================================================================
// SCRIPTED REPLICATION SOURCE
// ============================================================================

/// How a scripted stream behaves once its items are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Stay open until the session is stopped
    AwaitStop,
    /// End immediately, as if the session had been stopped
    Close,
}

/// Behavior of one `stream()` call on a [`ScriptedSource`] session.
#[derive(Debug, Clone)]
pub struct StreamScript {
    open_error: Option<StreamError>,
    items: Vec<Result<ChangeEvent, StreamError>>,
    end: StreamEnd,
}

impl StreamScript {
    /// Yield `events`, then stay open until stopped.
    pub fn events(events: Vec<ChangeEvent>) -> Self {
        Self {
            open_error: None,
            items: events.into_iter().map(Ok).collect(),
            end: StreamEnd::AwaitStop,
        }
    }

    /// Yield `events`, then break with [`StreamError::Interrupted`].
    pub fn events_then_fail(events: Vec<ChangeEvent>, reason: impl Into<String>) -> Self {
        let mut items: Vec<_> = events.into_iter().map(Ok).collect();
        items.push(Err(StreamError::Interrupted {
            reason: reason.into(),
        }));
        Self {
            open_error: None,
            items,
            end: StreamEnd::AwaitStop,
        }
    }

    /// Fail the `stream()` call itself with [`StreamError::Failed`].
    pub fn failing_open(reason: impl Into<String>) -> Self {
        Self {
            open_error: Some(StreamError::Failed {
                reason: reason.into(),
            }),
            items: Vec::new(),
            end: StreamEnd::AwaitStop,
        }
    }

    /// End the stream cleanly after its items instead of waiting for stop.
    pub fn then_close(mut self) -> Self {
        self.end = StreamEnd::Close;
        self
    }
}

#[derive(Debug)]
struct SourceState {
    master: Result<MasterStatus, SourceError>,
    scripts: VecDeque<StreamScript>,
    stream_starts: Vec<Option<ReplicationPosition>>,
    sessions: Vec<String>,
    master_status_calls: usize,
    stop_calls: usize,
}

/// Replication source double driven by a queue of [`StreamScript`]s.
///
/// Every `stream()` call, on any session, consumes the next script and
/// records the start position it was given. Once the queue is empty,
/// streams stay open until their session is stopped.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    config: SourceConfig,
    state: Arc<Mutex<SourceState>>,
}

impl ScriptedSource {
    pub fn new(position: ReplicationPosition) -> Self {
        Self::with_config(SourceConfig::new("/var/lib/mysql/binlogs"), position)
    }

    pub fn with_config(config: SourceConfig, position: ReplicationPosition) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(SourceState {
                master: Ok(master_status(position)),
                scripts: VecDeque::new(),
                stream_starts: Vec::new(),
                sessions: Vec::new(),
                master_status_calls: 0,
                stop_calls: 0,
            })),
        }
    }

    /// Queue the behavior of the next `stream()` call.
    pub fn push_script(&self, script: StreamScript) {
        lock(&self.state).scripts.push_back(script);
    }

    /// Change the position reported by subsequent status queries.
    pub fn set_master_position(&self, position: ReplicationPosition) {
        lock(&self.state).master = Ok(master_status(position));
    }

    /// Make subsequent status queries fail as if replication were off.
    pub fn fail_master_status(&self, reason: impl Into<String>) {
        lock(&self.state).master = Err(SourceError::MasterStatus {
            reason: reason.into(),
        });
    }

    /// Make subsequent status queries fail as if the server were down.
    pub fn make_unavailable(&self, reason: impl Into<String>) {
        lock(&self.state).master = Err(SourceError::Unavailable {
            reason: reason.into(),
        });
    }

    /// Start positions of every `stream()` call, in order.
    pub fn stream_starts(&self) -> Vec<Option<ReplicationPosition>> {
        lock(&self.state).stream_starts.clone()
    }

    /// Database names of every session created, in order.
    pub fn sessions(&self) -> Vec<String> {
        lock(&self.state).sessions.clone()
    }

    pub fn master_status_calls(&self) -> usize {
        lock(&self.state).master_status_calls
    }

    pub fn stop_calls(&self) -> usize {
        lock(&self.state).stop_calls
    }
}

fn master_status(position: ReplicationPosition) -> MasterStatus {
    MasterStatus {
        log_file: "vt-0000000001-bin.000001".to_string(),
        log_position: 4,
        position,
    }
}

#[async_trait]
impl ReplicationSource for ScriptedSource {
    fn config(&self) -> &SourceConfig {
        &self.config
    }

    async fn master_status(&self) -> Result<MasterStatus, SourceError> {
        let mut state = lock(&self.state);
        state.master_status_calls += 1;
        state.master.clone()
    }

    fn event_streamer(&self, db_name: &str) -> Arc<dyn EventStreamer> {
        lock(&self.state).sessions.push(db_name.to_string());
        let (stop_tx, _) = watch::channel(false);
        Arc::new(ScriptedStreamer {
            state: Arc::clone(&self.state),
            stop_tx,
        })
    }
}

struct ScriptedStreamer {
    state: Arc<Mutex<SourceState>>,
    stop_tx: watch::Sender<bool>,
}

#[async_trait]
impl EventStreamer for ScriptedStreamer {
    async fn stream(&self, start: Option<ReplicationPosition>) -> Result<EventStream, StreamError> {
        let script = {
            let mut state = lock(&self.state);
            state.stream_starts.push(start);
            state
                .scripts
                .pop_front()
                .unwrap_or_else(|| StreamScript::events(Vec::new()))
        };
        if let Some(error) = script.open_error {
            return Err(error);
        }

        let mut stop_rx = self.stop_tx.subscribe();
        let stream = async_stream::stream! {
            for item in script.items {
                if *stop_rx.borrow() {
                    return;
                }
                yield item;
            }
            if script.end == StreamEnd::AwaitStop {
                while !*stop_rx.borrow_and_update() {
                    if stop_rx.changed().await.is_err() {
                        break;
                    }
                }
            }
        };
        let stream: EventStream = Box::pin(stream);
        Ok(stream)
    }

    fn stop(&self) {
        lock(&self.state).stop_calls += 1;
        self.stop_tx.send_replace(true);
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for rowcache types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a MariaDB-flavored replication position.
    pub fn arb_position() -> impl Strategy<Value = ReplicationPosition> {
        (any::<u32>(), any::<u32>(), any::<u64>())
            .prop_map(|(domain, server, sequence)| ReplicationPosition::mariadb(domain, server, sequence))
    }

    /// Generate a well-formed raw value of any kind.
    pub fn arb_raw_value() -> impl Strategy<Value = RawValue> {
        prop_oneof![
            any::<i64>().prop_map(RawValue::int),
            any::<u64>().prop_map(RawValue::unsigned),
            "[a-z0-9\u{1f}]{0,12}".prop_map(|s| RawValue::text(&s)),
            proptest::collection::vec(any::<u8>(), 0..12).prop_map(|b| RawValue::binary(&b)),
            Just(RawValue::null(ColumnKind::Int)),
        ]
    }

    /// Generate a primary-key tuple of one to three well-formed values.
    pub fn arb_pk_tuple() -> impl Strategy<Value = Vec<RawValue>> {
        proptest::collection::vec(arb_raw_value(), 1..4)
    }

    /// Generate a change event of any recognized category.
    pub fn arb_change_event() -> impl Strategy<Value = ChangeEvent> {
        let ts = 1_700_000_000i64..1_800_000_000i64;
        prop_oneof![
            ("[A-Z ]{1,24}", ts.clone()).prop_map(|(sql, ts)| ChangeEvent::ddl(sql, ts)),
            (
                "[a-z_]{1,12}",
                proptest::collection::vec(arb_pk_tuple(), 0..5),
                ts.clone()
            )
                .prop_map(|(table, rows, ts)| ChangeEvent::dml(table, rows, ts)),
            ("[A-Z ]{1,24}", ts.clone()).prop_map(|(sql, ts)| ChangeEvent::unrecognized(sql, ts)),
            (arb_position(), ts).prop_map(|(pos, ts)| ChangeEvent::position(pos, ts)),
        ]
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made events and helpers for common scenarios.

    use super::*;

    /// Current unix time in seconds.
    pub fn now_unix() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }

    /// DML event for `table` with one single-column integer key per id.
    pub fn dml_int_keys(table: &str, ids: &[i64]) -> ChangeEvent {
        let rows = ids.iter().map(|id| vec![RawValue::int(*id)]).collect();
        ChangeEvent::dml(table, rows, now_unix())
    }

    /// DML event whose second row carries an undecodable integer.
    pub fn malformed_dml(table: &str) -> ChangeEvent {
        let rows = vec![
            vec![RawValue::int(1)],
            vec![RawValue::new(ColumnKind::Int, "not-a-number")],
        ];
        ChangeEvent::dml(table, rows, now_unix())
    }

    /// Invalidation key string for a single-column integer key.
    pub fn int_key(id: i64) -> String {
        build_key(&[SqlValue::Integral(id)])
            .map(InvalidationKey::into_string)
            .unwrap_or_default()
    }

    /// Sets or removes an environment variable, restoring the previous value
    /// on drop.
    pub struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        pub fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    /// Poll `condition` until it holds or `timeout` elapses.
    pub async fn wait_until<F>(timeout: Duration, condition: F) -> bool
    where
        F: Fn() -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if condition() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_scripted_stream_yields_then_waits_for_stop() {
        let source = ScriptedSource::new(ReplicationPosition::mariadb(0, 1, 1));
        source.push_script(StreamScript::events(vec![ChangeEvent::ddl("DROP TABLE t", 1)]));

        let streamer = source.event_streamer("vt_test");
        let mut stream = streamer.stream(None).await.unwrap();
        assert_eq!(stream.next().await, Some(Ok(ChangeEvent::ddl("DROP TABLE t", 1))));

        streamer.stop();
        assert_eq!(stream.next().await, None);
        assert_eq!(source.stream_starts(), vec![None]);
    }

    #[tokio::test]
    async fn test_stopped_session_ends_new_streams_immediately() {
        let source = ScriptedSource::new(ReplicationPosition::mariadb(0, 1, 1));
        let streamer = source.event_streamer("vt_test");
        streamer.stop();
        let mut stream = streamer.stream(None).await.unwrap();
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn test_env_var_guard_restores_value() {
        const KEY: &str = "ROWCACHE_TEST_UTILS_GUARD";
        {
            let _outer = fixtures::EnvVarGuard::set(KEY, Some("outer"));
            {
                let _inner = fixtures::EnvVarGuard::set(KEY, None);
                assert!(std::env::var(KEY).is_err());
            }
            assert_eq!(std::env::var(KEY).as_deref(), Ok("outer"));
        }
        assert!(std::env::var(KEY).is_err());
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let source = ScriptedSource::new(ReplicationPosition::mariadb(0, 1, 1));
        source.push_script(StreamScript::failing_open("no binlog"));
        source.push_script(StreamScript::events_then_fail(vec![], "reset"));
        let streamer = source.event_streamer("vt_test");

        assert!(matches!(
            streamer.stream(None).await.err(),
            Some(StreamError::Failed { .. })
        ));
        let mut stream = streamer.stream(None).await.unwrap();
        assert!(matches!(
            stream.next().await,
            Some(Err(StreamError::Interrupted { .. }))
        ));

        source.make_unavailable("connection refused");
        assert!(matches!(
            source.master_status().await,
            Err(SourceError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_recording_cache_failures() {
        let cache = RecordingCache::new();
        cache.fail_table("broken");
        assert!(cache.invalidate_for_dml("broken", &[]).await.is_err());
        assert!(cache.invalidate_for_dml("users", &[]).await.is_ok());
        assert_eq!(
            cache.calls(),
            vec![CacheCall::Dml {
                table: "users".to_string(),
                keys: vec![]
            }]
        );
    }
}
