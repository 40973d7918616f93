//! Attempt/retry state machine shared by both executors.
//!
//! A retried task continues in place on the flow that owns it; it is never
//! put back on the queue.

use std::time::Instant;

use opentelemetry::KeyValue;
use tracing::{Instrument, Span, debug, error, info, warn};

use super::{ExecutionContext, Job};
use crate::model::{State, Task, TaskOutcome};
use crate::oracle::Verdict;
use crate::telemetry::metrics;
use crate::telemetry::task::{record_state_transition, start_task_span};

/// Drive one job to a terminal outcome, record it, and deliver it.
pub(super) async fn run_job(ctx: ExecutionContext, job: Job) {
    let Job { mut task, admission } = job;
    let span = start_task_span(task.id, ctx.config.mode);

    async move {
        let started = Instant::now();
        let outcome = execute(&ctx, &mut task, &Span::current());

        if outcome == TaskOutcome::Completed {
            finalize(&ctx, &task).await;
        }

        // Release the id before the caller hears back, so an immediate
        // re-submission is judged by the store alone.
        drop(admission);

        let duration_ms = started.elapsed().as_millis() as f64;
        metrics::task_duration_ms().record(
            duration_ms,
            &[KeyValue::new("outcome", outcome.to_string())],
        );
        Span::current().record("task.retries", task.retry_count());

        let id = task.id;
        if task.deliver(outcome) {
            info!(
                task_id = %id,
                %outcome,
                code = outcome.code(),
                duration_ms,
                "task finished"
            );
        } else {
            debug!(task_id = %id, %outcome, "caller stopped waiting for result");
        }
    }
    .instrument(span)
    .await
}

/// Run attempts until the task reaches `Completed` or `Failed`.
fn execute(ctx: &ExecutionContext, task: &mut Task, span: &Span) -> TaskOutcome {
    let threshold = ctx.config.failure_threshold;
    let retry_limit = ctx.config.retry_limit;

    loop {
        transition(task, span, State::Executing);

        let verdict = ctx.oracle.verdict(task.id, task.retry_count(), threshold);
        metrics::task_attempts().add(1, &[KeyValue::new("verdict", verdict.as_str())]);

        match verdict {
            Verdict::Pass => {
                transition(task, span, State::Completed);
                return TaskOutcome::Completed;
            }
            Verdict::Fail => {
                let retries = task.record_failure();
                if retries <= retry_limit {
                    info!(task_id = %task.id, retry = retries, "attempt failed, retrying");
                    transition(task, span, State::Retrying);
                } else {
                    warn!(task_id = %task.id, retries, "retries exhausted");
                    transition(task, span, State::Failed);
                    return TaskOutcome::Failed;
                }
            }
        }
    }
}

/// Terminal write for a completed task. A store failure is logged; the
/// caller still learns the task completed.
async fn finalize(ctx: &ExecutionContext, task: &Task) {
    if !ctx.config.finalize_delay.is_zero() {
        tokio::time::sleep(ctx.config.finalize_delay).await;
    }
    if let Err(e) = ctx.store.add(task.id).await {
        error!(task_id = %task.id, error = %e, "failed to record completion");
    }
}

fn transition(task: &mut Task, span: &Span, to: State) {
    let from = task.state();
    match task.advance(to) {
        Ok(()) => record_state_transition(span, from, to),
        Err(e) => error!(task_id = %task.id, error = %e, "state machine fault"),
    }
}
