//! Core data model.
//!
//! A task is a numbered unit of work. It carries its retry count, its
//! lifecycle state, and the write-once sink through which the caller learns
//! the terminal outcome.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Task ID
// ---------------------------------------------------------------------------

/// Caller-supplied task identifier. Not validated for uniqueness beyond
/// the completion dedup check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<i64>()
            .map(TaskId)
            .map_err(|e| Error::Other(format!("invalid task id '{s}': {e}")))
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of a task inside an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Accepted, waiting for the executor to pick it up.
    Queued,
    /// An attempt is being judged by the oracle.
    Executing,
    /// Last attempt failed, retry budget remains.
    Retrying,
    /// Succeeded and recorded. Terminal.
    Completed,
    /// Retry budget exhausted. Terminal.
    Failed,
}

impl State {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: State) -> bool {
        use State::*;
        matches!(
            (self, to),
            (Queued, Executing)
                | (Executing, Completed)
                | (Executing, Retrying)
                | (Executing, Failed)
                | (Retrying, Executing)
        )
    }

    /// Is this a terminal state?
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Completed | State::Failed)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            State::Queued => "queued",
            State::Executing => "executing",
            State::Retrying => "retrying",
            State::Completed => "completed",
            State::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Terminal outcome delivered on a task's result sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed,
    Failed,
}

impl TaskOutcome {
    /// Wire sentinel: 1 for success, 2 for failure.
    pub fn code(self) -> u8 {
        match self {
            TaskOutcome::Completed => 1,
            TaskOutcome::Failed => 2,
        }
    }
}

impl std::fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskOutcome::Completed => "completed",
            TaskOutcome::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Result sink
// ---------------------------------------------------------------------------

/// Receiving half of a task's result sink. Resolves once, with the terminal
/// outcome, or errors if the task was dropped without reaching one.
pub type ResultReceiver = oneshot::Receiver<TaskOutcome>;

/// Write-once sending half. Delivery consumes the sink, so a second write
/// cannot be expressed.
#[derive(Debug)]
pub struct ResultSink(oneshot::Sender<TaskOutcome>);

impl ResultSink {
    /// Deliver the outcome. Returns false if the receiver is gone.
    pub fn deliver(self, outcome: TaskOutcome) -> bool {
        self.0.send(outcome).is_ok()
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A unit of work and its mutable retry state.
#[derive(Debug)]
pub struct Task {
    pub id: TaskId,
    retry_count: u32,
    state: State,
    sink: ResultSink,
}

impl Task {
    /// Create a queued task with a fresh result sink.
    pub fn new(id: TaskId) -> (Self, ResultReceiver) {
        let (tx, rx) = oneshot::channel();
        let task = Self {
            id,
            retry_count: 0,
            state: State::Queued,
            sink: ResultSink(tx),
        };
        (task, rx)
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Failed attempts so far. Always 0 for a freshly created task.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Count one failed attempt and return the new total.
    pub(crate) fn record_failure(&mut self) -> u32 {
        self.retry_count += 1;
        self.retry_count
    }

    /// Move to `to`, rejecting transitions the lifecycle does not allow.
    pub fn advance(&mut self, to: State) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Hand the terminal outcome to the caller. The task is consumed.
    pub fn deliver(self, outcome: TaskOutcome) -> bool {
        debug_assert!(self.state.is_terminal());
        self.sink.deliver(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_absorbing() {
        for to in [
            State::Queued,
            State::Executing,
            State::Retrying,
            State::Completed,
            State::Failed,
        ] {
            assert!(!State::Completed.can_transition_to(to));
            assert!(!State::Failed.can_transition_to(to));
        }
    }

    #[test]
    fn advance_rejects_skipping_execution() {
        let (mut task, _rx) = Task::new(TaskId(1));
        let err = task.advance(State::Completed).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: State::Queued,
                to: State::Completed
            }
        ));
        assert_eq!(task.state(), State::Queued);
        assert_eq!(task.retry_count(), 0);
    }

    #[tokio::test]
    async fn deliver_reaches_receiver_once() {
        let (mut task, rx) = Task::new(TaskId(5));
        task.advance(State::Executing).unwrap();
        task.advance(State::Completed).unwrap();
        assert!(task.deliver(TaskOutcome::Completed));
        assert_eq!(rx.await.unwrap(), TaskOutcome::Completed);
    }

    #[test]
    fn deliver_reports_dropped_receiver() {
        let (mut task, rx) = Task::new(TaskId(5));
        drop(rx);
        task.advance(State::Executing).unwrap();
        task.advance(State::Failed).unwrap();
        assert!(!task.deliver(TaskOutcome::Failed));
    }

    #[test]
    fn task_id_parses_from_string() {
        assert_eq!(" 42 ".parse::<TaskId>().unwrap(), TaskId(42));
        assert!("forty-two".parse::<TaskId>().is_err());
    }

    #[test]
    fn outcome_codes() {
        assert_eq!(TaskOutcome::Completed.code(), 1);
        assert_eq!(TaskOutcome::Failed.code(), 2);
    }
}
