//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Batches (started, duration)
//! - Asset jobs (published, failed, rejected by validation)
//! - Outbound transport (retries, request outcomes)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Batch Metrics
// =============================================================================

/// Batches accepted for processing.
pub static BATCHES_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("reuploader_batches_started_total", "Total batches started").unwrap()
});

/// Wall-clock duration of a batch, validation through last publish.
pub static BATCH_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "reuploader_batch_duration_seconds",
            "Duration of a full batch",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
    )
    .unwrap()
});

// =============================================================================
// Asset Metrics
// =============================================================================

/// Assets republished successfully.
pub static ASSETS_PUBLISHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reuploader_assets_published_total",
        "Total assets republished successfully",
    )
    .unwrap()
});

/// Asset jobs that failed after validation.
pub static ASSETS_FAILED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reuploader_assets_failed_total",
            "Total asset jobs that failed",
        ),
        &["stage"], // "fetch", "publish", "panic"
    )
    .unwrap()
});

/// Assets excluded by validation.
pub static ASSETS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reuploader_assets_rejected_total",
            "Total assets excluded by validation",
        ),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// Transport Metrics
// =============================================================================

/// Retries issued by the transport.
pub static TRANSPORT_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reuploader_transport_retries_total",
            "Total retried outbound requests",
        ),
        &["method"],
    )
    .unwrap()
});

/// Outbound requests by final outcome.
pub static TRANSPORT_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reuploader_transport_requests_total",
            "Total outbound requests",
        ),
        &["method", "status"], // status: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Batches
        Box::new(BATCHES_STARTED.clone()),
        Box::new(BATCH_DURATION.clone()),
        // Assets
        Box::new(ASSETS_PUBLISHED.clone()),
        Box::new(ASSETS_FAILED.clone()),
        Box::new(ASSETS_REJECTED.clone()),
        // Transport
        Box::new(TRANSPORT_RETRIES.clone()),
        Box::new(TRANSPORT_REQUESTS.clone()),
    ]
}
