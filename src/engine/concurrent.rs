//! Concurrent executor: a bounded work channel drained by one intake loop
//! that spawns an independent execution flow per task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, mpsc};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::attempt::run_job;
use super::{ExecutionContext, Job};
use crate::error::{Error, Result};

pub struct ConcurrentExecutor {
    ctx: ExecutionContext,
    tx: mpsc::Sender<Job>,
    rx: Mutex<Option<mpsc::Receiver<Job>>>,
    shutdown: Arc<Notify>,
    stopped: AtomicBool,
}

impl ConcurrentExecutor {
    pub fn new(ctx: ExecutionContext) -> Self {
        let (tx, rx) = mpsc::channel(ctx.config.queue_capacity.max(1));
        Self {
            ctx,
            tx,
            rx: Mutex::new(Some(rx)),
            shutdown: Arc::new(Notify::new()),
            stopped: AtomicBool::new(false),
        }
    }

    /// Spawn the intake loop.
    pub fn start(&self) -> Result<JoinHandle<()>> {
        if self.is_stopped() {
            return Err(Error::Stopped);
        }
        let rx = self
            .rx
            .lock()
            .map_err(|_| Error::Other("intake receiver lock poisoned".to_string()))?
            .take()
            .ok_or(Error::AlreadyStarted)?;

        let ctx = self.ctx.clone();
        let shutdown = Arc::clone(&self.shutdown);
        Ok(tokio::spawn(intake(ctx, rx, shutdown)))
    }

    /// Queue a job. A full channel rejects the job instead of waiting.
    pub fn enqueue(&self, job: Job) -> Result<()> {
        if self.is_stopped() {
            return Err(Error::Stopped);
        }
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                warn!(
                    task_id = %job.task.id,
                    capacity = self.ctx.config.queue_capacity,
                    "work queue full"
                );
                Err(Error::QueueSaturated(job.task.id))
            }
            Err(TrySendError::Closed(_)) => Err(Error::Stopped),
        }
    }

    /// Stop taking work off the channel. Flows already spawned run to the end
    /// and the intake handle resolves once they have.
    pub fn shutdown(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.shutdown.notify_one();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Runs until stopped, then waits for every spawned flow to reach its
/// terminal store write before returning.
async fn intake(ctx: ExecutionContext, mut rx: mpsc::Receiver<Job>, shutdown: Arc<Notify>) {
    info!(capacity = ctx.config.queue_capacity, "concurrent executor started");
    let mut flows = JoinSet::new();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.notified() => {
                info!("concurrent executor shutting down");
                break;
            }
            Some(joined) = flows.join_next(), if !flows.is_empty() => {
                reap(joined);
            }
            job = rx.recv() => {
                let Some(job) = job else { break };
                debug!(task_id = %job.task.id, "spawning execution flow");
                flows.spawn(run_job(ctx.clone(), job));
            }
        }
    }

    if !flows.is_empty() {
        info!(active = flows.len(), "waiting for in-flight tasks");
    }
    while let Some(joined) = flows.join_next().await {
        reap(joined);
    }
    info!("concurrent executor stopped");
}

fn reap(joined: std::result::Result<(), JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "execution flow aborted");
    }
}
