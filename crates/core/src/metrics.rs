//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Submission and job outcomes
//! - Encoding (duration, source failures, publication)
//! - Quality flags and remediation

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Orchestrator Metrics
// =============================================================================

/// Processed videos created by submissions.
pub static VIDEOS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "postplex_videos_submitted_total",
            "Total processed videos created by submissions",
        ),
        &["preset"],
    )
    .unwrap()
});

/// Jobs finished by result.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("postplex_jobs_total", "Total uniquify jobs processed"),
        &["result"], // "completed", "retrying", "failed", "stale"
    )
    .unwrap()
});

/// Jobs currently being processed.
pub static JOBS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("postplex_jobs_in_flight", "Uniquify jobs currently running").unwrap()
});

/// Retries scheduled by error class.
pub static RETRY_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("postplex_retry_attempts_total", "Total retry attempts"),
        &["error"], // "source_unavailable", "encode_failed", "storage_unavailable"
    )
    .unwrap()
});

/// End-to-end job duration in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("postplex_job_duration_seconds", "Duration of uniquify jobs")
            .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Executor Metrics
// =============================================================================

/// Encode duration in seconds.
pub static ENCODE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("postplex_encode_duration_seconds", "Duration of ffmpeg encodes")
            .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["platform"],
    )
    .unwrap()
});

/// Bytes published to the artifact store.
pub static ARTIFACT_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "postplex_artifact_bytes_total",
        "Total bytes published to the artifact store",
    )
    .unwrap()
});

// =============================================================================
// Quality Metrics
// =============================================================================

/// Quality flags raised by defect type.
pub static QUALITY_FLAGS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("postplex_quality_flags_total", "Total quality flags raised"),
        &["defect"],
    )
    .unwrap()
});

/// Remediations requested by kind.
pub static REMEDIATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("postplex_remediations_total", "Total remediation requests"),
        &["kind"], // "quick_fix", "reprocess"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Orchestrator
        Box::new(VIDEOS_SUBMITTED.clone()),
        Box::new(JOBS_TOTAL.clone()),
        Box::new(JOBS_IN_FLIGHT.clone()),
        Box::new(RETRY_ATTEMPTS.clone()),
        Box::new(JOB_DURATION.clone()),
        // Executor
        Box::new(ENCODE_DURATION.clone()),
        Box::new(ARTIFACT_BYTES.clone()),
        // Quality
        Box::new(QUALITY_FLAGS_TOTAL.clone()),
        Box::new(REMEDIATIONS_TOTAL.clone()),
    ]
}
