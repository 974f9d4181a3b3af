//! Prometheus registry for the worker process.
//!
//! Registers the core collectors alongside worker gauges that are refreshed
//! from the orchestrator status before every snapshot.

use once_cell::sync::Lazy;
use prometheus::{self, Encoder, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use postplex_core::orchestrator::OrchestratorStatus;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Whether the worker pool is running.
pub static WORKER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("postplex_worker_running", "Whether the worker pool is running (1) or not (0)")
        .unwrap()
});

/// Jobs held by the queue, by state.
pub static QUEUE_DEPTH: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("postplex_queue_depth", "Jobs held by the queue"),
        &["state"], // "waiting", "delayed", "active"
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry.register(Box::new(WORKER_RUNNING.clone())).unwrap();
    registry.register(Box::new(QUEUE_DEPTH.clone())).unwrap();

    for metric in postplex_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Refresh the gauges from the current orchestrator status.
pub fn collect_dynamic_metrics(status: &OrchestratorStatus) {
    WORKER_RUNNING.set(i64::from(status.running));
    QUEUE_DEPTH
        .with_label_values(&["waiting"])
        .set(status.queued_jobs as i64);
    QUEUE_DEPTH
        .with_label_values(&["delayed"])
        .set(status.delayed_jobs as i64);
    QUEUE_DEPTH
        .with_label_values(&["active"])
        .set(status.active_jobs as i64);
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
