//! Task execution span helpers.

use tracing::Span;

use crate::config::Mode;
use crate::model::{State, TaskId};
use crate::telemetry::metrics;
use opentelemetry::KeyValue;

/// Start the span that wraps one task's whole attempt chain.
pub fn start_task_span(id: TaskId, mode: Mode) -> Span {
    tracing::info_span!(
        "task.execute",
        "task.id" = %id,
        "task.mode" = %mode,
        "task.retries" = tracing::field::Empty,
    )
}

/// Record a state transition as an event on `span` and bump the counter.
pub fn record_state_transition(span: &Span, from: State, to: State) {
    span.in_scope(|| {
        tracing::info!(%from, %to, "state_transition");
    });
    metrics::task_state_transitions().add(
        1,
        &[
            KeyValue::new("from", from.to_string()),
            KeyValue::new("to", to.to_string()),
        ],
    );
}
