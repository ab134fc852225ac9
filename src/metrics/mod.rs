//! Prometheus metrics for the publishing pipeline
//!
//! This module provides metrics tracking for:
//! - Runs: per-trigger outcomes and whether a run is active
//! - Slots: terminal status per site
//! - Generation: duration per site and which parse stage produced the artifact
//! - API: request counts and latency
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

struct PipelineMetrics {
    runs: CounterVec,
    run_active: Gauge,
    slots: CounterVec,
    generation_duration: HistogramVec,
    generation_stage: CounterVec,
    api_requests: CounterVec,
    api_duration: HistogramVec,
}

static PIPELINE_METRICS: OnceLock<PipelineMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Safe to call more than once; only the first call registers.
///
/// ```ignore
/// if let Err(e) = dailypress::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = PipelineMetrics {
        runs: register_counter_vec!(
            "dailypress_runs_total",
            "Publish runs by trigger and outcome",
            &["trigger", "outcome"]
        )?,
        run_active: register_gauge!(
            "dailypress_run_active",
            "Whether a publish run is in progress (1 = yes, 0 = no)"
        )?,
        slots: register_counter_vec!(
            "dailypress_slots_total",
            "Slots that reached a terminal status in a run",
            &["site", "status"]
        )?,
        generation_duration: register_histogram_vec!(
            "dailypress_generation_duration_seconds",
            "Time spent generating one artifact",
            &["site"],
            vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
        )?,
        generation_stage: register_counter_vec!(
            "dailypress_generation_stage_total",
            "Parse ladder stage that produced the artifact",
            &["stage"]
        )?,
        api_requests: register_counter_vec!(
            "dailypress_api_requests_total",
            "Total API requests by endpoint and status",
            &["endpoint", "status"]
        )?,
        api_duration: register_histogram_vec!(
            "dailypress_api_request_duration_seconds",
            "API request duration in seconds",
            &["endpoint"],
            vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
        )?,
    };

    PIPELINE_METRICS
        .set(metrics)
        .map_err(|_| "Pipeline metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    PIPELINE_METRICS.get().is_some()
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

/// Record a finished (or refused) run
pub fn record_run(trigger: &str, outcome: &str) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.runs.with_label_values(&[trigger, outcome]).inc();
    }
}

pub fn set_run_active(active: bool) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.run_active.set(if active { 1.0 } else { 0.0 });
    }
}

/// Record a slot reaching `Published` or `Failed`
pub fn record_slot(site: &str, status: &str) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.slots.with_label_values(&[site, status]).inc();
    }
}

/// Record which ladder stage yielded the artifact
pub fn record_generation_stage(stage: &str) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.generation_stage.with_label_values(&[stage]).inc();
    }
}

/// Record API request
pub fn record_api_request(endpoint: &str, status: u16, duration_secs: f64) {
    let Some(m) = PIPELINE_METRICS.get() else {
        return;
    };

    let status_str = status.to_string();
    m.api_requests
        .with_label_values(&[endpoint, &status_str])
        .inc();
    m.api_duration
        .with_label_values(&[endpoint])
        .observe(duration_secs);
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a generation timer for `site`
pub fn start_generation_timer(site: &str) -> MetricsTimer {
    match PIPELINE_METRICS.get() {
        Some(m) => MetricsTimer::new(
            m.generation_duration
                .with_label_values(&[site])
                .start_timer(),
        ),
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// Tests
// ============================================================================
