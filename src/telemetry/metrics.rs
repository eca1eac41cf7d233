//! Metric instrument factories for sciworker.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments come from the `"sciworker"` meter and are no-ops until a
//! provider is installed.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for sciworker instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("sciworker")
}

/// Counter: completed run-loop iterations.
/// Labels: `worker`.
pub fn worker_iterations() -> Counter<u64> {
    meter()
        .u64_counter("sciworker.worker.iterations")
        .with_description("Number of completed run-loop iterations")
        .build()
}

/// Counter: hook faults (errors and caught panics).
/// Labels: `worker`, `hook`.
pub fn worker_faults() -> Counter<u64> {
    meter()
        .u64_counter("sciworker.worker.faults")
        .with_description("Number of hook faults")
        .build()
}

/// Counter: worker state transitions.
/// Labels: `from`, `to`.
pub fn worker_state_transitions() -> Counter<u64> {
    meter()
        .u64_counter("sciworker.worker.state_transitions")
        .with_description("Number of worker state transitions")
        .build()
}

/// Counter: items evicted from a full input queue under drop-oldest.
pub fn queue_displaced() -> Counter<u64> {
    meter()
        .u64_counter("sciworker.queue.displaced")
        .with_description("Work items displaced from a full input queue")
        .build()
}

/// Histogram: hook duration in milliseconds.
/// Labels: `hook`.
pub fn hook_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("sciworker.hook.duration_ms")
        .with_description("Hook duration in milliseconds")
        .with_unit("ms")
        .build()
}
