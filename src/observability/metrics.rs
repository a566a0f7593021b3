//! Metrics collection and exposition.
//!
//! # Metrics
//! - `worker_submissions_total` (counter): submissions by message kind and outcome
//! - `worker_account_sequence` (gauge): cached account sequence
//! - `worker_account_balance` (gauge): cached balance in the fee denomination
//! - `worker_inference_fetch_failures_total` (counter): per topic
//! - `worker_active_topics` (gauge): workers currently running

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_submission(kind: &'static str, outcome: &'static str) {
    metrics::counter!("worker_submissions_total", "kind" => kind, "outcome" => outcome).increment(1);
}

pub fn record_account(sequence: u64, balance: u128) {
    metrics::gauge!("worker_account_sequence").set(sequence as f64);
    metrics::gauge!("worker_account_balance").set(balance as f64);
}

pub fn record_inference_failure(topic_id: u64) {
    metrics::counter!("worker_inference_fetch_failures_total", "topic" => topic_id.to_string())
        .increment(1);
}

pub fn set_active_topics(count: usize) {
    metrics::gauge!("worker_active_topics").set(count as f64);
}
