//! Prometheus metrics for mirrorwatch runs
//!
//! This module tracks:
//! - Probes by outcome and probe latency
//! - Probe cache hits
//! - Transitions by kind (failed-over, degraded, restored)
//! - Publish outcome and last run time
//!
//! # Usage
//!
//! Call `init_metrics()` at startup to register all metrics. Until then every
//! recording function is a no-op, so library users and tests pay nothing.
//! A run is a short-lived process, so metrics are exported by writing a
//! node-exporter textfile with [`write_textfile`] rather than by serving them.

use prometheus::{
    register_counter_vec, register_gauge, register_histogram, CounterVec, Encoder, Gauge,
    Histogram, TextEncoder,
};
use std::path::Path;
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all run metrics
struct RunMetrics {
    probes: CounterVec,
    probe_latency: Histogram,
    cache_hits: CounterVec,
    transitions: CounterVec,
    degraded_resources: Gauge,
    publish: CounterVec,
    last_run_timestamp: Gauge,
}

/// Global storage for run metrics
static RUN_METRICS: OnceLock<RunMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Safe to call more than once; only the first call registers.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = mirrorwatch::metrics::init_metrics() {
///     tracing::warn!("Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = RunMetrics {
        probes: register_counter_vec!(
            "mirrorwatch_probes_total",
            "Total probes issued by outcome",
            &["outcome"]
        )?,
        probe_latency: register_histogram!(
            "mirrorwatch_probe_latency_seconds",
            "Latency of playable probes in seconds",
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
        )?,
        cache_hits: register_counter_vec!(
            "mirrorwatch_probe_cache_hits_total",
            "Probe lookups answered by the per-run cache",
            &["source"]
        )?,
        transitions: register_counter_vec!(
            "mirrorwatch_transitions_total",
            "Resource transitions by kind",
            &["kind"]
        )?,
        degraded_resources: register_gauge!(
            "mirrorwatch_degraded_resources",
            "Resources left on a failing mirror by the last run"
        )?,
        publish: register_counter_vec!(
            "mirrorwatch_publish_total",
            "Publish decisions by outcome",
            &["outcome"]
        )?,
        last_run_timestamp: register_gauge!(
            "mirrorwatch_last_run_timestamp_seconds",
            "Unix time the last run finished"
        )?,
    };

    RUN_METRICS
        .set(metrics)
        .map_err(|_| "Run metrics already initialized")?;

    tracing::debug!("Prometheus metrics initialized");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    RUN_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Write the current metrics to a textfile-collector file
///
/// Writes to a sibling temp file first and renames it into place so the
/// collector never reads a partial file.
pub fn write_textfile(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let text = encode_metrics()?;
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Record one finished probe
pub fn record_probe(outcome: &str) {
    if let Some(m) = RUN_METRICS.get() {
        m.probes.with_label_values(&[outcome]).inc();
    }
}

/// Record the latency of a playable probe
pub fn observe_probe_latency(seconds: f64) {
    if let Some(m) = RUN_METRICS.get() {
        m.probe_latency.observe(seconds);
    }
}

/// Record a probe answered from the cache
pub fn record_cache_hit() {
    if let Some(m) = RUN_METRICS.get() {
        m.cache_hits.with_label_values(&["probe"]).inc();
    }
}

/// Record a resource transition
pub fn record_transition(kind: &str) {
    if let Some(m) = RUN_METRICS.get() {
        m.transitions.with_label_values(&[kind]).inc();
    }
}

/// Set the number of degraded resources after a run
pub fn set_degraded_resources(count: usize) {
    if let Some(m) = RUN_METRICS.get() {
        m.degraded_resources.set(count as f64);
    }
}

/// Record the publish outcome of a run
pub fn record_publish(outcome: &str) {
    if let Some(m) = RUN_METRICS.get() {
        m.publish.with_label_values(&[outcome]).inc();
    }
}

/// Record the time a run finished
pub fn record_run_finished(unix_seconds: i64) {
    if let Some(m) = RUN_METRICS.get() {
        m.last_run_timestamp.set(unix_seconds as f64);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ensure_metrics_initialized() {
        let _ = init_metrics();
    }

    #[test]
    fn test_init_metrics_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
        assert!(metrics_initialized());
    }

    #[test]
    fn test_recorded_metrics_are_encoded() {
        ensure_metrics_initialized();
        record_probe("playable");
        record_transition("failed_over");
        record_publish("published");
        set_degraded_resources(2);

        let text = encode_metrics().unwrap();
        assert!(text.contains("mirrorwatch_probes_total"));
        assert!(text.contains("mirrorwatch_transitions_total"));
        assert!(text.contains("mirrorwatch_degraded_resources 2"));
    }

    #[test]
    fn test_write_textfile() {
        ensure_metrics_initialized();
        record_run_finished(1_700_000_000);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirrorwatch.prom");
        write_textfile(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("mirrorwatch_last_run_timestamp_seconds"));
        assert!(!path.with_extension("prom.tmp").exists());
    }

    #[test]
    fn test_recording_never_panics() {
        record_probe("unreachable");
        observe_probe_latency(0.2);
        record_cache_hit();
        record_transition("restored");
        set_degraded_resources(0);
        record_publish("no_change");
        record_run_finished(0);
    }
}
