//! Metric instrument factories for taskq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"taskq"` meter; with no
//! provider installed they are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("taskq")
}

/// Counter: submissions seen by the dispatcher.
/// Labels: `mode`, `result` ("ok" | "duplicate" | "in_flight" | "saturated" | "stopped" | "error").
pub fn tasks_submitted() -> Counter<u64> {
    meter()
        .u64_counter("taskq.tasks.submitted")
        .with_description("Number of task submissions")
        .build()
}

/// Counter: task state transitions.
/// Labels: `from`, `to`.
pub fn task_state_transitions() -> Counter<u64> {
    meter()
        .u64_counter("taskq.tasks.state_transitions")
        .with_description("Number of task state transitions")
        .build()
}

/// Counter: execution attempts judged by the oracle.
/// Labels: `verdict` ("pass" | "fail").
pub fn task_attempts() -> Counter<u64> {
    meter()
        .u64_counter("taskq.tasks.attempts")
        .with_description("Number of execution attempts")
        .build()
}

/// Counter: completion store operations.
/// Labels: `operation`, `result`.
pub fn store_operations() -> Counter<u64> {
    meter()
        .u64_counter("taskq.store.operations")
        .with_description("Number of completion store operations")
        .build()
}

/// Histogram: time from dequeue to terminal outcome.
/// Labels: `outcome`.
pub fn task_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("taskq.tasks.duration_ms")
        .with_description("Task execution duration in milliseconds")
        .with_unit("ms")
        .build()
}
