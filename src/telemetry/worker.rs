//! Worker run-loop span helpers.
//!
//! Every worker's loop runs inside a `worker.run` span; state transitions
//! and hook faults are recorded as events scoped to it.

use tracing::Span;

use crate::model::{Fault, WorkerId, WorkerState};

/// Start the span a worker's run loop executes in.
///
/// The `worker.state` field is declared empty and is updated by
/// [`record_state_transition`].
pub fn start_worker_span(worker: &WorkerId) -> Span {
    tracing::info_span!(
        "worker.run",
        "worker.name" = %worker,
        "worker.state" = tracing::field::Empty,
    )
}

/// Record a state transition on the worker span.
pub fn record_state_transition(span: &Span, from: WorkerState, to: WorkerState) {
    span.record("worker.state", tracing::field::display(to));
    span.in_scope(|| {
        tracing::info!(from = %from, to = %to, "state_transition");
    });
}

/// Record a hook fault on the worker span.
pub fn record_fault(span: &Span, fault: &Fault) {
    span.in_scope(|| {
        tracing::warn!(
            hook = %fault.hook,
            iteration = fault.iteration,
            error = %fault.message,
            "hook_fault"
        );
    });
}
