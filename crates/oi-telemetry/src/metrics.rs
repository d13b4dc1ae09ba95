//! Prometheus metrics for the open-interest pipeline.
//!
//! Covers:
//! - Poll cycles and per-symbol failures for both loops
//! - Upstream retries and rejected requests
//! - Window fill and deviation per symbol
//! - Fired alerts
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a startup bug, and only happens during
//! static initialization.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, CounterVec, Encoder, GaugeVec, TextEncoder,
};

/// Completed poll cycles.
/// Labels: loop (historical/current)
pub static POLL_CYCLES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "oi_poll_cycles_total",
        "Completed poll cycles per loop",
        &["loop"]
    )
    .unwrap()
});

/// Per-symbol failures inside a poll cycle.
pub static SYMBOL_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "oi_symbol_failures_total",
        "Per-symbol failures inside a poll cycle",
        &["loop", "symbol"]
    )
    .unwrap()
});

/// Upstream retries.
/// Labels: endpoint (historical/current)
pub static UPSTREAM_RETRIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "oi_upstream_retries_total",
        "Upstream request retries after timeout or connection failure",
        &["endpoint"]
    )
    .unwrap()
});

/// Non-2xx upstream responses.
pub static UPSTREAM_HTTP_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "oi_upstream_http_errors_total",
        "Upstream responses with a non-2xx status",
        &["endpoint", "status"]
    )
    .unwrap()
});

/// Fired deviation alerts.
/// Labels: symbol, direction (up/down)
pub static ALERTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "oi_alerts_total",
        "Open-interest deviation alerts fired",
        &["symbol", "direction"]
    )
    .unwrap()
});

/// Window length seen by the detector.
pub static WINDOW_LENGTH: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "oi_window_length",
        "Historical window length read by the detector",
        &["symbol"]
    )
    .unwrap()
});

/// Last computed deviation from the window average, in percent.
pub static DEVIATION_PCT: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "oi_deviation_pct",
        "Deviation of current open interest from the window average (percent)",
        &["symbol"]
    )
    .unwrap()
});

/// Analyses skipped because the window never filled.
pub static INSUFFICIENT_WINDOW_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "oi_insufficient_window_total",
        "Detector runs skipped because the window was not full",
        &["symbol"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record a completed poll cycle.
    pub fn poll_cycle(loop_name: &str) {
        POLL_CYCLES_TOTAL.with_label_values(&[loop_name]).inc();
    }

    /// Record a per-symbol failure.
    pub fn symbol_failure(loop_name: &str, symbol: &str) {
        SYMBOL_FAILURES_TOTAL
            .with_label_values(&[loop_name, symbol])
            .inc();
    }

    /// Record an upstream retry.
    pub fn upstream_retry(endpoint: &str) {
        UPSTREAM_RETRIES_TOTAL.with_label_values(&[endpoint]).inc();
    }

    /// Record a non-2xx upstream response.
    pub fn upstream_http_error(endpoint: &str, status: u16) {
        UPSTREAM_HTTP_ERRORS_TOTAL
            .with_label_values(&[endpoint, &status.to_string()])
            .inc();
    }

    /// Record a fired alert.
    pub fn alert_fired(symbol: &str, direction: &str) {
        ALERTS_TOTAL.with_label_values(&[symbol, direction]).inc();
    }

    /// Update window length.
    pub fn window_length(symbol: &str, len: usize) {
        WINDOW_LENGTH.with_label_values(&[symbol]).set(len as f64);
    }

    /// Update deviation.
    pub fn deviation_pct(symbol: &str, pct: f64) {
        DEVIATION_PCT.with_label_values(&[symbol]).set(pct);
    }

    /// Record a skipped analysis.
    pub fn insufficient_window(symbol: &str) {
        INSUFFICIENT_WINDOW_TOTAL.with_label_values(&[symbol]).inc();
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn encode_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
