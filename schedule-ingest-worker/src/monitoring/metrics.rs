//! Prometheus counters for the runner loop, compiled only
//! under the `monitoring` feature. Scaled down from the teacher's
//! `monitoring::metrics` to the handful of counters this worker's own data
//! flow produces — sessions processed/failed, versions created, events
//! emitted, notifications stored.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref SESSIONS_PROCESSED_TOTAL: IntCounter = IntCounter::new(
        "schedule_ingest_sessions_processed_total",
        "Total number of capture sessions finalized as done"
    ).unwrap();

    pub static ref SESSIONS_FAILED_TOTAL: IntCounter = IntCounter::new(
        "schedule_ingest_sessions_failed_total",
        "Total number of capture sessions finalized as failed"
    ).unwrap();

    pub static ref VERSIONS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "schedule_ingest_versions_created_total",
        "Total number of schedule_version rows inserted"
    ).unwrap();

    pub static ref EVENTS_EMITTED_TOTAL: IntCounter = IntCounter::new(
        "schedule_ingest_events_emitted_total",
        "Total number of schedule_event rows inserted"
    ).unwrap();

    pub static ref NOTIFICATIONS_STORED_TOTAL: IntCounter = IntCounter::new(
        "schedule_ingest_notifications_stored_total",
        "Total number of schedule_notification rows inserted"
    ).unwrap();
}

/// Register every counter with the global [`REGISTRY`]. Call once at
/// startup; a second call would return an `AlreadyReg` error from the
/// underlying crate, so callers should not retry this on failure.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(SESSIONS_PROCESSED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SESSIONS_FAILED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VERSIONS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(EVENTS_EMITTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(NOTIFICATIONS_STORED_TOTAL.clone()))?;
    Ok(())
}

/// Render the registry in the Prometheus text exposition format. Nothing in
/// this crate serves it over HTTP;
/// an embedding process can call this and serve it however it likes.
pub fn gather() -> String {
    let metric_families = REGISTRY.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).expect("prometheus text encoding never fails");
    String::from_utf8(buffer).expect("prometheus text encoding is always valid UTF-8")
}
