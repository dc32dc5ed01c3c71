//! Prometheus Status Metrics
//!
//! The invalidator's state lives in the service itself, so its metrics are
//! read on scrape rather than recorded on change. [`StatusCollector`] wraps a
//! set of gauges together with the closures that read their current values.

use crate::service::RowcacheInvalidator;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{IntGauge, IntGaugeVec, Opts, Registry};

type ReadValue = Box<dyn Fn() -> i64 + Send + Sync>;
type ReadLabeled = Box<dyn Fn() -> Vec<(String, i64)> + Send + Sync>;

enum Probe {
    Value { gauge: IntGauge, read: ReadValue },
    Labeled { gauge: IntGaugeVec, read: ReadLabeled },
}

/// Gauges whose values are computed at collection time.
#[derive(Default)]
pub struct StatusCollector {
    probes: Vec<Probe>,
}

impl StatusCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain gauge reporting `read()`.
    pub fn gauge(
        mut self,
        name: &str,
        help: &str,
        read: impl Fn() -> i64 + Send + Sync + 'static,
    ) -> prometheus::Result<Self> {
        let gauge = IntGauge::new(name, help)?;
        self.probes.push(Probe::Value {
            gauge,
            read: Box::new(read),
        });
        Ok(self)
    }

    /// Add a gauge with one series per `(label value, value)` pair returned
    /// by `read()`. Series absent from a collection are dropped.
    pub fn labeled_gauge(
        mut self,
        name: &str,
        help: &str,
        label: &str,
        read: impl Fn() -> Vec<(String, i64)> + Send + Sync + 'static,
    ) -> prometheus::Result<Self> {
        let gauge = IntGaugeVec::new(Opts::new(name, help), &[label])?;
        self.probes.push(Probe::Labeled {
            gauge,
            read: Box::new(read),
        });
        Ok(self)
    }

    /// Add a gauge exposing a single text value as its label, set to 1.
    pub fn text_gauge(
        self,
        name: &str,
        help: &str,
        label: &str,
        read: impl Fn() -> String + Send + Sync + 'static,
    ) -> prometheus::Result<Self> {
        self.labeled_gauge(name, help, label, move || vec![(read(), 1)])
    }
}

impl Collector for StatusCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.probes
            .iter()
            .flat_map(|probe| match probe {
                Probe::Value { gauge, .. } => gauge.desc(),
                Probe::Labeled { gauge, .. } => gauge.desc(),
            })
            .collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.probes
            .iter()
            .flat_map(|probe| match probe {
                Probe::Value { gauge, read } => {
                    gauge.set(read());
                    gauge.collect()
                }
                Probe::Labeled { gauge, read } => {
                    gauge.reset();
                    for (label, value) in read() {
                        gauge.with_label_values(&[label.as_str()]).set(value);
                    }
                    gauge.collect()
                }
            })
            .collect()
    }
}

/// Register the invalidator's status gauges with `registry`.
///
/// Exposes:
/// - `rowcache_invalidator_state{state}`: current lifecycle state
/// - `rowcache_invalidator_position{position}`: last replication position
/// - `rowcache_invalidator_lag_seconds`: seconds behind the last event
/// - `rowcache_internal_errors{category}`: internal error counts
pub fn register_invalidator_metrics(
    registry: &Registry,
    invalidator: &RowcacheInvalidator,
) -> prometheus::Result<()> {
    let state = invalidator.clone();
    let position = invalidator.clone();
    let lag = invalidator.clone();
    let errors = invalidator.internal_errors();

    let collector = StatusCollector::new()
        .text_gauge(
            "rowcache_invalidator_state",
            "Rowcache invalidator lifecycle state",
            "state",
            move || state.state().to_string(),
        )?
        .text_gauge(
            "rowcache_invalidator_position",
            "Last replication position seen by the rowcache invalidator",
            "position",
            move || position.current_position_text(),
        )?
        .gauge(
            "rowcache_invalidator_lag_seconds",
            "Seconds between an event's commit and its invalidation",
            move || lag.lag_seconds(),
        )?
        .labeled_gauge(
            "rowcache_internal_errors",
            "Internal errors by category",
            "category",
            move || {
                errors
                    .snapshot()
                    .by_category()
                    .iter()
                    .map(|(category, count)| (category.to_string(), *count as i64))
                    .collect()
            },
        )?;

    registry.register(Box::new(collector))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};
    use rowcache_core::{InvalidatorConfig, ReplicationPosition};
    use rowcache_test_utils::{RecordingCache, ScriptedSource};
    use std::sync::Arc;

    fn render(registry: &Registry) -> String {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    fn invalidator() -> RowcacheInvalidator {
        RowcacheInvalidator::new(
            Arc::new(RecordingCache::new()),
            InvalidatorConfig::development(),
        )
    }

    #[test]
    fn test_stopped_invalidator_metrics() {
        let registry = Registry::new();
        let rci = invalidator();
        register_invalidator_metrics(&registry, &rci).unwrap();

        let text = render(&registry);
        assert!(text.contains("rowcache_invalidator_state{state=\"Stopped\"} 1"));
        assert!(text.contains("rowcache_invalidator_position{position=\"<nil>\"} 1"));
        assert!(text.contains("rowcache_invalidator_lag_seconds 0"));
        assert!(text.contains("rowcache_internal_errors{category=\"Invalidation\"} 0"));
        assert!(text.contains("rowcache_internal_errors{category=\"Panic\"} 0"));
    }

    #[tokio::test]
    async fn test_metrics_follow_service_state() {
        let registry = Registry::new();
        let rci = invalidator();
        register_invalidator_metrics(&registry, &rci).unwrap();

        let source = ScriptedSource::new(ReplicationPosition::mariadb(0, 41983, 17));
        rci.open("vt_test", Arc::new(source)).await.unwrap();
        rci.internal_errors().add_panic();

        let text = render(&registry);
        assert!(text.contains("rowcache_invalidator_state{state=\"Running\"} 1"));
        assert!(!text.contains("state=\"Stopped\""));
        assert!(text.contains("rowcache_invalidator_position{position=\"0-41983-17\"} 1"));
        assert!(text.contains("rowcache_internal_errors{category=\"Panic\"} 1"));

        rci.close().await;
        assert!(render(&registry).contains("rowcache_invalidator_state{state=\"Stopped\"} 1"));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let registry = Registry::new();
        let rci = invalidator();
        register_invalidator_metrics(&registry, &rci).unwrap();
        assert!(register_invalidator_metrics(&registry, &rci).is_err());
    }

    #[test]
    fn test_collector_describes_every_gauge() {
        let collector = StatusCollector::new()
            .gauge("a_gauge", "A", || 1)
            .unwrap()
            .text_gauge("b_gauge", "B", "name", || "x".to_string())
            .unwrap();
        assert_eq!(collector.desc().len(), 2);
        assert_eq!(collector.collect().len(), 2);
    }
}
