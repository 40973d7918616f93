//! Error types for taskq.

use thiserror::Error;

use crate::model::{State, TaskId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("task already completed: {0}")]
    DuplicateSubmission(TaskId),

    #[error("task already in flight: {0}")]
    InFlight(TaskId),

    #[error("queue full, task {0} not accepted")]
    QueueSaturated(TaskId),

    #[error("executor stopped")]
    Stopped,

    #[error("executor already started")]
    AlreadyStarted,

    #[error("completion store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: State, to: State },

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Metric label for a rejected submission.
    pub fn rejection_label(&self) -> &'static str {
        match self {
            Error::DuplicateSubmission(_) => "duplicate",
            Error::InFlight(_) => "in_flight",
            Error::QueueSaturated(_) => "saturated",
            Error::Stopped => "stopped",
            _ => "error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
