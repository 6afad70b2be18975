//! Prometheus metrics (spec §7 "user-visible behavior": order count,
//! pair count, match attempts success/fail, expired-order sweeps).

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Metric names as constants for consistency, following the teacher's
/// `metrics::names` module.
pub mod names {
    pub const ORDERS_LIVE: &str = "orders_live";
    pub const PAIRS_LIVE: &str = "pairs_live";
    pub const ORDERS_EXPIRED_TOTAL: &str = "orders_expired_total";
    pub const EXPIRATION_SWEEP_DURATION_SECONDS: &str = "expiration_sweep_duration_seconds";

    pub const MATCH_ATTEMPTS_TOTAL: &str = "match_attempts_total";
    pub const MATCH_ATTEMPT_DURATION_SECONDS: &str = "match_attempt_duration_seconds";

    pub const CHAIN_EVENTS_TOTAL: &str = "chain_events_total";
    pub const MEMPOOL_TRANSACTIONS_TOTAL: &str = "mempool_transactions_total";
    pub const DATUM_DECODE_FAILURES_TOTAL: &str = "datum_decode_failures_total";
    pub const ROLLBACKS_TOTAL: &str = "rollbacks_total";
}

pub mod labels {
    pub const OUTCOME: &str = "outcome";
    pub const SOURCE: &str = "source";
}

/// Installs the Prometheus recorder and configures histogram buckets,
/// following the teacher's `init_metrics` shape.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(names::MATCH_ATTEMPT_DURATION_SECONDS.to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
        )
        .unwrap()
        .set_buckets_for_metric(
            Matcher::Full(names::EXPIRATION_SWEEP_DURATION_SECONDS.to_string()),
            &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5],
        )
        .unwrap();

    builder.install_recorder().expect("failed to install Prometheus recorder")
}

pub fn set_orders_live(count: usize) {
    gauge!(names::ORDERS_LIVE).set(count as f64);
}

pub fn set_pairs_live(count: usize) {
    gauge!(names::PAIRS_LIVE).set(count as f64);
}

pub fn record_expiration_sweep(removed: usize, duration_secs: f64) {
    counter!(names::ORDERS_EXPIRED_TOTAL).increment(removed as u64);
    histogram!(names::EXPIRATION_SWEEP_DURATION_SECONDS).record(duration_secs);
}

pub fn record_match_attempt(outcome: &str, duration_secs: f64) {
    counter!(names::MATCH_ATTEMPTS_TOTAL, labels::OUTCOME => outcome.to_string()).increment(1);
    histogram!(names::MATCH_ATTEMPT_DURATION_SECONDS, labels::OUTCOME => outcome.to_string()).record(duration_secs);
}

pub fn record_chain_event(kind: &str) {
    counter!(names::CHAIN_EVENTS_TOTAL, labels::SOURCE => kind.to_string()).increment(1);
}

pub fn record_mempool_transaction() {
    counter!(names::MEMPOOL_TRANSACTIONS_TOTAL).increment(1);
}

pub fn record_datum_decode_failure(source: &str) {
    counter!(names::DATUM_DECODE_FAILURES_TOTAL, labels::SOURCE => source.to_string()).increment(1);
}

pub fn record_rollback() {
    counter!(names::ROLLBACKS_TOTAL).increment(1);
}
