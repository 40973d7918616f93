//! Sequential executor: one worker drains an unbounded FIFO queue.
//!
//! Only one task is in flight at a time. Retries keep the task in place on
//! the worker, so later arrivals wait for its whole retry chain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::attempt::run_job;
use super::{ExecutionContext, Job};
use crate::error::{Error, Result};

pub struct SequentialExecutor {
    ctx: ExecutionContext,
    tx: mpsc::UnboundedSender<Job>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Job>>>,
    shutdown: Arc<Notify>,
    stopped: AtomicBool,
}

impl SequentialExecutor {
    pub fn new(ctx: ExecutionContext) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            ctx,
            tx,
            rx: Mutex::new(Some(rx)),
            shutdown: Arc::new(Notify::new()),
            stopped: AtomicBool::new(false),
        }
    }

    /// Spawn the worker loop. A stopped executor cannot be restarted.
    pub fn start(&self) -> Result<JoinHandle<()>> {
        if self.is_stopped() {
            return Err(Error::Stopped);
        }
        let rx = self
            .rx
            .lock()
            .map_err(|_| Error::Other("worker receiver lock poisoned".to_string()))?
            .take()
            .ok_or(Error::AlreadyStarted)?;

        let ctx = self.ctx.clone();
        let shutdown = Arc::clone(&self.shutdown);
        Ok(tokio::spawn(drain(ctx, rx, shutdown)))
    }

    /// Append a job to the tail of the queue.
    pub fn enqueue(&self, job: Job) -> Result<()> {
        if self.is_stopped() {
            return Err(Error::Stopped);
        }
        self.tx.send(job).map_err(|_| Error::Stopped)
    }

    /// One-shot stop. Halts future dequeues; the task in flight finishes.
    /// Jobs still queued are dropped and their callers see a closed sink.
    pub fn shutdown(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.shutdown.notify_one();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

async fn drain(
    ctx: ExecutionContext,
    mut rx: mpsc::UnboundedReceiver<Job>,
    shutdown: Arc<Notify>,
) {
    info!("sequential executor started");
    loop {
        let job = tokio::select! {
            biased;
            _ = shutdown.notified() => {
                info!("task processing stopped");
                break;
            }
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };
        debug!(task_id = %job.task.id, "dequeued");
        run_job(ctx.clone(), job).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::{ExecutorConfig, Mode};
    use crate::engine::Admission;
    use crate::model::{ResultReceiver, Task, TaskId, TaskOutcome};
    use crate::oracle::ScriptedOracle;
    use crate::store::{CompletionStore, MemoryStore};

    fn job(id: i64) -> (Job, ResultReceiver) {
        let (task, rx) = Task::new(TaskId(id));
        (
            Job {
                task,
                admission: Admission::detached(TaskId(id)),
            },
            rx,
        )
    }

    #[tokio::test]
    async fn completes_in_submission_order() {
        let store = Arc::new(MemoryStore::new());
        let exec = SequentialExecutor::new(ExecutionContext::new(
            ExecutorConfig::new(Mode::Sequential, 0),
            store.clone(),
            Arc::new(ScriptedOracle::always_pass()),
        ));

        // Queue before starting so the order is fixed.
        let mut receivers = Vec::new();
        for id in [1, 2, 3] {
            let (j, rx) = job(id);
            exec.enqueue(j).unwrap();
            receivers.push(rx);
        }
        let _handle = exec.start().unwrap();

        for rx in receivers {
            let outcome = tokio::time::timeout(Duration::from_secs(5), rx)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(outcome, TaskOutcome::Completed);
        }
        assert_eq!(
            store.entries().await.unwrap(),
            vec![TaskId(1), TaskId(2), TaskId(3)]
        );
    }

    #[tokio::test]
    async fn retries_hold_the_worker() {
        let store = Arc::new(MemoryStore::new());
        // Task 1 fails twice then passes; task 2 passes at once.
        let oracle = Arc::new(ScriptedOracle::new([1.0, 1.0, 99.0, 99.0], 0.0));
        let exec = SequentialExecutor::new(ExecutionContext::new(
            ExecutorConfig::new(Mode::Sequential, 50),
            store.clone(),
            oracle.clone(),
        ));

        let (j1, rx1) = job(1);
        let (j2, rx2) = job(2);
        exec.enqueue(j1).unwrap();
        exec.enqueue(j2).unwrap();
        let _handle = exec.start().unwrap();

        assert_eq!(rx1.await.unwrap(), TaskOutcome::Completed);
        assert_eq!(rx2.await.unwrap(), TaskOutcome::Completed);
        assert_eq!(
            oracle.attempts(),
            vec![(TaskId(1), 0), (TaskId(1), 1), (TaskId(1), 2), (TaskId(2), 0)]
        );
    }

    #[tokio::test]
    async fn stop_is_permanent() {
        let exec = SequentialExecutor::new(ExecutionContext::new(
            ExecutorConfig::new(Mode::Sequential, 0),
            Arc::new(MemoryStore::new()),
            Arc::new(ScriptedOracle::always_pass()),
        ));
        let handle = exec.start().unwrap();
        exec.shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(exec.start(), Err(Error::Stopped)));
        let (j, _rx) = job(4);
        assert!(matches!(exec.enqueue(j), Err(Error::Stopped)));
    }
}
