//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes only the counters/gauges relevant to watch sessions.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across watch sessions.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Metrics")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

struct MetricsInner {
    registry: Registry,
    events_emitted_total: IntCounterVec,
    change_events_total: IntCounter,
    copies_total: IntCounterVec,
    ready_timeouts_total: IntCounter,
    bytes_copied_total: IntCounter,
    active_sessions: IntGauge,
}

/// Snapshot of selected gauges and counters for status reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Number of sessions currently watching.
    pub active_sessions: i64,
    /// Change notifications accepted by sessions.
    pub change_events_total: u64,
    /// Successful copies.
    pub copies_succeeded_total: u64,
    /// Failed copies.
    pub copies_failed_total: u64,
    /// Changes skipped because the file never became ready.
    pub ready_timeouts_total: u64,
    /// Bytes written to destinations by successful copies.
    pub bytes_copied_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let events_emitted_total = IntCounterVec::new(
            Opts::new("events_emitted_total", "Watch events emitted by type"),
            &["type"],
        )
        .map_err(|source| collector("events_emitted_total", source))?;
        let change_events_total = IntCounter::with_opts(Opts::new(
            "change_events_total",
            "Change notifications accepted by watch sessions",
        ))
        .map_err(|source| collector("change_events_total", source))?;
        let copies_total = IntCounterVec::new(
            Opts::new("copies_total", "Copy attempts by outcome"),
            &["outcome"],
        )
        .map_err(|source| collector("copies_total", source))?;
        let ready_timeouts_total = IntCounter::with_opts(Opts::new(
            "ready_timeouts_total",
            "Changes skipped because the file never became ready",
        ))
        .map_err(|source| collector("ready_timeouts_total", source))?;
        let bytes_copied_total = IntCounter::with_opts(Opts::new(
            "bytes_copied_total",
            "Bytes mirrored to destination files",
        ))
        .map_err(|source| collector("bytes_copied_total", source))?;
        let active_sessions = IntGauge::with_opts(Opts::new(
            "active_sessions",
            "Watch sessions currently subscribed to change notifications",
        ))
        .map_err(|source| collector("active_sessions", source))?;

        register(&registry, "events_emitted_total", &events_emitted_total)?;
        register(&registry, "change_events_total", &change_events_total)?;
        register(&registry, "copies_total", &copies_total)?;
        register(&registry, "ready_timeouts_total", &ready_timeouts_total)?;
        register(&registry, "bytes_copied_total", &bytes_copied_total)?;
        register(&registry, "active_sessions", &active_sessions)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                events_emitted_total,
                change_events_total,
                copies_total,
                ready_timeouts_total,
                bytes_copied_total,
                active_sessions,
            }),
        })
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Count an accepted change notification.
    pub fn inc_change_event(&self) {
        self.inner.change_events_total.inc();
    }

    /// Count a successful copy and the bytes it wrote.
    pub fn record_copy_succeeded(&self, bytes: u64) {
        self.inner
            .copies_total
            .with_label_values(&["succeeded"])
            .inc();
        self.inner.bytes_copied_total.inc_by(bytes);
    }

    /// Count a failed copy.
    pub fn record_copy_failed(&self) {
        self.inner.copies_total.with_label_values(&["failed"]).inc();
    }

    /// Count a change skipped by the readiness gate.
    pub fn inc_ready_timeout(&self) {
        self.inner.ready_timeouts_total.inc();
    }

    /// Track a session entering the watching state.
    pub fn session_started(&self) {
        self.inner.active_sessions.inc();
    }

    /// Track a session leaving the watching state.
    pub fn session_stopped(&self) {
        self.inner.active_sessions.dec();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the session counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_sessions: self.inner.active_sessions.get(),
            change_events_total: self.inner.change_events_total.get(),
            copies_succeeded_total: self
                .inner
                .copies_total
                .with_label_values(&["succeeded"])
                .get(),
            copies_failed_total: self.inner.copies_total.with_label_values(&["failed"]).get(),
            ready_timeouts_total: self.inner.ready_timeouts_total.get(),
            bytes_copied_total: self.inner.bytes_copied_total.get(),
        }
    }
}

const fn collector(name: &'static str, source: prometheus::Error) -> TelemetryError {
    TelemetryError::MetricsCollector { name, source }
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_event("copy_succeeded");
        metrics.inc_change_event();
        metrics.inc_change_event();
        metrics.record_copy_succeeded(10);
        metrics.record_copy_failed();
        metrics.inc_ready_timeout();
        metrics.session_started();

        let snapshot = metrics.snapshot();
        assert_eq!(
            snapshot,
            MetricsSnapshot {
                active_sessions: 1,
                change_events_total: 2,
                copies_succeeded_total: 1,
                copies_failed_total: 1,
                ready_timeouts_total: 1,
                bytes_copied_total: 10,
            }
        );

        metrics.session_stopped();
        assert_eq!(metrics.snapshot().active_sessions, 0);

        let rendered = metrics.render()?;
        assert!(rendered.contains("copies_total"));
        assert!(rendered.contains("ready_timeouts_total"));
        assert!(rendered.contains("events_emitted_total"));
        Ok(())
    }

    #[test]
    fn clones_share_registry() -> Result<()> {
        let metrics = Metrics::new()?;
        let clone = metrics.clone();
        clone.inc_ready_timeout();
        assert_eq!(metrics.snapshot().ready_timeouts_total, 1);
        Ok(())
    }
}
