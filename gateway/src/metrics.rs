//! Prometheus metrics for the gateway

use crate::error::{GatewayError, Result};
use prometheus::{
    CounterVec, Encoder, HistogramVec, TextEncoder, register_counter_vec, register_histogram_vec,
};
use std::sync::OnceLock;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// All gateway metrics
pub struct Metrics {
    /// Records received (by path: push, pull)
    pub records_received: CounterVec,

    /// Records excluded from output (by reason)
    pub records_dropped: CounterVec,

    /// Records written to a channel (by channel)
    pub records_routed: CounterVec,

    /// Failed channel writes (by channel)
    pub sink_failures: CounterVec,

    /// Poll cycles (by vendor, outcome: ok, sink, or the failing stage)
    pub poll_cycles: CounterVec,

    /// Poll cycle duration (by vendor)
    pub poll_duration: HistogramVec,
}

impl Metrics {
    /// Initialize metrics (call once at startup)
    ///
    /// Returns error if metric registration fails.
    pub fn init() -> Result<&'static Metrics> {
        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let metrics = Metrics {
            records_received: register_counter_vec!(
                "gateway_records_received_total",
                "Total records received",
                &["path"]
            )
            .map_err(|e| GatewayError::Metrics(format!("records_received: {e}")))?,

            records_dropped: register_counter_vec!(
                "gateway_records_dropped_total",
                "Total records excluded from output",
                &["reason"]
            )
            .map_err(|e| GatewayError::Metrics(format!("records_dropped: {e}")))?,

            records_routed: register_counter_vec!(
                "gateway_records_routed_total",
                "Total records written to output channels",
                &["channel"]
            )
            .map_err(|e| GatewayError::Metrics(format!("records_routed: {e}")))?,

            sink_failures: register_counter_vec!(
                "gateway_sink_failures_total",
                "Total failed channel writes",
                &["channel"]
            )
            .map_err(|e| GatewayError::Metrics(format!("sink_failures: {e}")))?,

            poll_cycles: register_counter_vec!(
                "gateway_poll_cycles_total",
                "Total polling cycles by outcome",
                &["vendor", "outcome"]
            )
            .map_err(|e| GatewayError::Metrics(format!("poll_cycles: {e}")))?,

            poll_duration: register_histogram_vec!(
                "gateway_poll_duration_seconds",
                "Polling cycle duration",
                &["vendor"],
                vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
            )
            .map_err(|e| GatewayError::Metrics(format!("poll_duration: {e}")))?,
        };

        // Set the metrics (only succeeds once)
        let _ = METRICS.set(metrics);

        METRICS
            .get()
            .ok_or_else(|| GatewayError::Metrics("Failed to initialize metrics".to_string()))
    }

    /// Get the global metrics instance
    ///
    /// Returns None if metrics haven't been initialized yet.
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }

    pub fn record_received(&self, path: &str, count: u64) {
        self.records_received
            .with_label_values(&[path])
            .inc_by(count as f64);
    }

    pub fn record_dropped(&self, reason: &str, count: u64) {
        self.records_dropped
            .with_label_values(&[reason])
            .inc_by(count as f64);
    }

    pub fn record_routed(&self, channel: &str, count: u64) {
        self.records_routed
            .with_label_values(&[channel])
            .inc_by(count as f64);
    }

    pub fn record_sink_failure(&self, channel: &str) {
        self.sink_failures.with_label_values(&[channel]).inc();
    }

    pub fn record_poll(&self, vendor: &str, outcome: &str, seconds: f64) {
        self.poll_cycles
            .with_label_values(&[vendor, outcome])
            .inc();
        self.poll_duration
            .with_label_values(&[vendor])
            .observe(seconds);
    }
}

/// Gather all metrics and encode as Prometheus text format
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}

/// Record received records if metrics are initialized
pub fn try_record_received(path: &str, count: u64) {
    if let Some(m) = Metrics::get() {
        m.record_received(path, count);
    }
}

/// Record dropped records if metrics are initialized
pub fn try_record_dropped(reason: &str, count: u64) {
    if let Some(m) = Metrics::get() {
        m.record_dropped(reason, count);
    }
}

/// Record a channel write if metrics are initialized
pub fn try_record_routed(channel: &str, count: u64) {
    if let Some(m) = Metrics::get() {
        m.record_routed(channel, count);
    }
}

/// Record a failed channel write if metrics are initialized
pub fn try_record_sink_failure(channel: &str) {
    if let Some(m) = Metrics::get() {
        m.record_sink_failure(channel);
    }
}

/// Record a finished poll cycle if metrics are initialized
pub fn try_record_poll(vendor: &str, outcome: &str, seconds: f64) {
    if let Some(m) = Metrics::get() {
        m.record_poll(vendor, outcome, seconds);
    }
}
