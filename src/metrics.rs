//! Prometheus metrics for the mint relayer
//!
//! Exposes metrics on /metrics endpoint for Prometheus scraping.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_int_counter, register_int_gauge, CounterVec,
    Gauge, IntCounter, IntGauge,
};

lazy_static! {
    pub static ref SOURCE_HEIGHT: IntGauge = register_int_gauge!(
        "mint_relayer_source_height",
        "Latest source chain block height observed"
    ).unwrap();

    pub static ref DEPOSITS_OBSERVED: IntCounter = register_int_counter!(
        "mint_relayer_deposits_observed_total",
        "Total number of deposit events delivered by the source filter"
    ).unwrap();

    pub static ref DEFERRED_EVENTS: IntGauge = register_int_gauge!(
        "mint_relayer_deferred_events",
        "Deposit events waiting for confirmations"
    ).unwrap();

    pub static ref REJECTED: CounterVec = register_counter_vec!(
        "mint_relayer_rejected_total",
        "Deposit events rejected by validation",
        &["reason"]
    ).unwrap();

    pub static ref REPLAY_SKIPS: IntCounter = register_int_counter!(
        "mint_relayer_replay_skips_total",
        "Deposit events skipped because they were already relayed"
    ).unwrap();

    pub static ref BROADCASTS: CounterVec = register_counter_vec!(
        "mint_relayer_broadcasts_total",
        "Mint broadcasts by terminal status",
        &["status"]
    ).unwrap();

    pub static ref REPLAY_STORE_SIZE: IntGauge = register_int_gauge!(
        "mint_relayer_replay_store_entries",
        "Number of source transactions recorded as relayed"
    ).unwrap();

    pub static ref FILTER_REACQUISITIONS: IntCounter = register_int_counter!(
        "mint_relayer_filter_reacquisitions_total",
        "Times the source log filter was lost and reinstalled"
    ).unwrap();

    pub static ref ERRORS: CounterVec = register_counter_vec!(
        "mint_relayer_errors_total",
        "Relay cycle errors by class",
        &["class"]
    ).unwrap();

    pub static ref UP: Gauge = register_gauge!(
        "mint_relayer_up",
        "Whether the relay loop is running"
    ).unwrap();

    pub static ref LAST_SUCCESSFUL_POLL: Gauge = register_gauge!(
        "mint_relayer_last_successful_poll_timestamp",
        "Unix timestamp of last successful poll"
    ).unwrap();
}

/// Record the source head seen by a poll
pub fn record_source_height(height: u64) {
    SOURCE_HEIGHT.set(height as i64);
}

pub fn record_deposits_observed(count: usize) {
    DEPOSITS_OBSERVED.inc_by(count as u64);
}

pub fn set_deferred_events(count: usize) {
    DEFERRED_EVENTS.set(count as i64);
}

pub fn record_rejected(reason: &str) {
    REJECTED.with_label_values(&[reason]).inc();
}

pub fn record_replay_skip() {
    REPLAY_SKIPS.inc();
}

/// Record a broadcast result (`confirmed`, `submitted`, `failed`, `timeout`, ...)
pub fn record_broadcast(status: &str) {
    BROADCASTS.with_label_values(&[status]).inc();
}

pub fn set_replay_store_size(entries: usize) {
    REPLAY_STORE_SIZE.set(entries as i64);
}

pub fn record_filter_reacquired() {
    FILTER_REACQUISITIONS.inc();
}

pub fn record_error(class: &str) {
    ERRORS.with_label_values(&[class]).inc();
}

/// Record last successful poll
pub fn record_successful_poll() {
    let timestamp = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
    LAST_SUCCESSFUL_POLL.set(timestamp);
}
