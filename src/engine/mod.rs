//! Execution engine: dispatcher front door, the two executor strategies,
//! and the attempt/retry state machine they share.
//!
//! ```text
//! submit ─▶ admission lock ─▶ store.exists ─▶ Executor::enqueue
//!                                              │
//!                         Queued ─▶ Executing ─┬─▶ Completed ─▶ store.add ─▶ sink(1)
//!                                     ▲        ├─▶ Retrying ─┘ (continue in place)
//!                                     └────────┘
//!                                              └─▶ Failed ─▶ sink(2)
//! ```

mod attempt;
pub mod concurrent;
pub mod dispatcher;
pub mod sequential;

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::{ExecutorConfig, Mode};
use crate::error::Result;
use crate::model::Task;
use crate::oracle::OutcomeOracle;
use crate::store::CompletionStore;

pub use concurrent::ConcurrentExecutor;
pub use dispatcher::{Admission, Dispatcher};
pub use sequential::SequentialExecutor;

/// Everything an execution flow needs, shared by every flow of one executor.
#[derive(Clone)]
pub struct ExecutionContext {
    pub config: Arc<ExecutorConfig>,
    pub store: Arc<dyn CompletionStore>,
    pub oracle: Arc<dyn OutcomeOracle>,
}

impl ExecutionContext {
    pub fn new(
        config: ExecutorConfig,
        store: Arc<dyn CompletionStore>,
        oracle: Arc<dyn OutcomeOracle>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            oracle,
        }
    }
}

/// An admitted task on its way through an executor. The admission is
/// released once the task's terminal store write is done.
#[derive(Debug)]
pub struct Job {
    pub task: Task,
    pub admission: Admission,
}

/// The configured execution strategy. Picked once at construction.
pub enum Executor {
    Concurrent(ConcurrentExecutor),
    Sequential(SequentialExecutor),
}

impl Executor {
    /// Build the strategy named by `ctx.config.mode`.
    pub fn new(ctx: ExecutionContext) -> Self {
        match ctx.config.mode {
            Mode::Concurrent => Executor::Concurrent(ConcurrentExecutor::new(ctx)),
            Mode::Sequential => Executor::Sequential(SequentialExecutor::new(ctx)),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Executor::Concurrent(_) => Mode::Concurrent,
            Executor::Sequential(_) => Mode::Sequential,
        }
    }

    /// Spawn the drain loop. Fails if already started or stopped.
    pub fn start(&self) -> Result<JoinHandle<()>> {
        match self {
            Executor::Concurrent(e) => e.start(),
            Executor::Sequential(e) => e.start(),
        }
    }

    /// Hand a job to the queue without waiting for it to run.
    pub fn enqueue(&self, job: Job) -> Result<()> {
        match self {
            Executor::Concurrent(e) => e.enqueue(job),
            Executor::Sequential(e) => e.enqueue(job),
        }
    }

    /// Fire the one-shot stop signal.
    pub fn shutdown(&self) {
        match self {
            Executor::Concurrent(e) => e.shutdown(),
            Executor::Sequential(e) => e.shutdown(),
        }
    }

    pub fn is_stopped(&self) -> bool {
        match self {
            Executor::Concurrent(e) => e.is_stopped(),
            Executor::Sequential(e) => e.is_stopped(),
        }
    }
}
