//! Feed Engine Metrics
//!
//! Prometheus metrics for feed composition and new-content counting

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, Histogram,
    HistogramVec, IntCounterVec,
};
use std::time::Duration;

use crate::models::ContentKind;

static REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_engine_requests_total",
        "Total feed engine requests by outcome",
        &["operation", "feed_mode", "tab", "status"]
    )
    .expect("Failed to register feed engine requests metric")
});

static REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "feed_engine_request_duration_seconds",
        "End-to-end duration of feed engine operations",
        &["operation"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register feed engine request duration metric")
});

static FETCH_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "feed_engine_fetch_duration_seconds",
        "Duration of a single content repository fetch",
        &["kind"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register feed engine fetch duration metric")
});

static DEGRADED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_engine_degraded_total",
        "Responses served with part of the content left out",
        &["reason"]
    )
    .expect("Failed to register feed engine degraded metric")
});

static ITEMS_RETURNED: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "feed_engine_items_returned",
        "Items per returned feed page",
        vec![0.0, 1.0, 5.0, 10.0, 20.0, 50.0, 100.0]
    )
    .expect("Failed to register feed engine items returned metric")
});

/// Record a finished request (status: ok/error/<error kind>)
pub fn record_request(operation: &str, feed_mode: &str, tab: &str, status: &str) {
    REQUESTS_TOTAL
        .with_label_values(&[operation, feed_mode, tab, status])
        .inc();
}

pub fn record_request_duration(operation: &str, duration: Duration) {
    REQUEST_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration.as_secs_f64());
}

pub fn record_fetch_duration(kind: ContentKind, duration: Duration) {
    FETCH_DURATION_SECONDS
        .with_label_values(&[kind.as_str()])
        .observe(duration.as_secs_f64());
}

/// Record a degradation (reason: content kind name, "graph" or "affinity")
pub fn record_degraded(reason: &str) {
    DEGRADED_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_items_returned(count: usize) {
    ITEMS_RETURNED.observe(count as f64);
}
