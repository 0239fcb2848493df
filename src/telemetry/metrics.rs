//! Metric instrument factories for triage-engine.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without one installed, every instrument is a no-op.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("triage-engine")
}

/// Counter: lock acquire attempts.
/// Labels: `result` ("granted" | "renewed" | "denied" | "timed_out").
pub fn lock_acquisitions() -> Counter<u64> {
    meter()
        .u64_counter("triage.lock.acquisitions")
        .with_description("Review lock acquire attempts")
        .build()
}

/// Counter: lock releases.
/// Labels: `result` ("released" | "not_held").
pub fn lock_releases() -> Counter<u64> {
    meter()
        .u64_counter("triage.lock.releases")
        .with_description("Review lock release calls")
        .build()
}

/// Counter: abandoned locks reclaimed by the sweeper.
pub fn locks_swept() -> Counter<u64> {
    meter()
        .u64_counter("triage.lock.swept")
        .with_description("Expired review locks removed by the sweeper")
        .build()
}

/// Histogram: items in each assembled worklist.
pub fn worklist_assembled() -> Histogram<u64> {
    meter()
        .u64_histogram("triage.worklist.items")
        .with_description("Items in each assembled worklist")
        .build()
}

/// Histogram: worklist assembly time in milliseconds.
pub fn assembly_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("triage.worklist.assembly_duration_ms")
        .with_description("Worklist assembly duration in milliseconds")
        .with_unit("ms")
        .build()
}
