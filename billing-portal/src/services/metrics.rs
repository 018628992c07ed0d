//! Prometheus metrics for billing-portal.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_counter_vec, register_histogram_vec, register_int_counter_vec,
    CounterVec, Encoder, HistogramVec, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "billing_portal_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// HTTP requests by method, matched route and status
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// HTTP request duration histogram
pub static HTTP_REQUEST_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Payment workflow outcomes
pub static PAYMENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Adjustment workflow outcomes
pub static ADJUSTMENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Bill retrieval outcomes
pub static RETRIEVALS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Posted amounts by kind (payment, adjustment)
pub static POSTED_AMOUNT_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Initialize all metrics. Safe to call more than once.
pub fn init_metrics() {
    HTTP_REQUESTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("billing_portal_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"]
        )
        .expect("Failed to register HTTP_REQUESTS_TOTAL")
    });

    HTTP_REQUEST_DURATION.get_or_init(|| {
        register_histogram_vec!(
            histogram_opts!(
                "billing_portal_http_request_duration_seconds",
                "HTTP request duration",
                vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
            ),
            &["method", "path"]
        )
        .expect("Failed to register HTTP_REQUEST_DURATION")
    });

    PAYMENTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billing_portal_payments_total",
                "Bill payment requests by outcome"
            ),
            &["outcome"]
        )
        .expect("Failed to register PAYMENTS_TOTAL")
    });

    ADJUSTMENTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billing_portal_adjustments_total",
                "Bill adjustment requests by outcome"
            ),
            &["outcome"]
        )
        .expect("Failed to register ADJUSTMENTS_TOTAL")
    });

    RETRIEVALS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billing_portal_bill_retrievals_total",
                "Bill retrieval requests by outcome"
            ),
            &["outcome"]
        )
        .expect("Failed to register RETRIEVALS_TOTAL")
    });

    POSTED_AMOUNT_TOTAL.get_or_init(|| {
        register_counter_vec!(
            opts!(
                "billing_portal_posted_amount_total",
                "Total amount posted by kind"
            ),
            &["kind"]
        )
        .expect("Failed to register POSTED_AMOUNT_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_http_request(method: &str, path: &str, status: &str, duration_secs: f64) {
    if let Some(counter) = HTTP_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[method, path, status]).inc();
    }
    if let Some(histogram) = HTTP_REQUEST_DURATION.get() {
        histogram
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }
}

pub fn record_payment(outcome: &str) {
    if let Some(counter) = PAYMENTS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_adjustment(outcome: &str) {
    if let Some(counter) = ADJUSTMENTS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_retrieval(outcome: &str) {
    if let Some(counter) = RETRIEVALS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_posted_amount(kind: &str, amount: f64) {
    if let Some(counter) = POSTED_AMOUNT_TOTAL.get() {
        counter.with_label_values(&[kind]).inc_by(amount.abs());
    }
}
