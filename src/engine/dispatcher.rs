//! Dispatcher: the submission front door shared by both executors.
//!
//! A submission passes the per-id admission lock, then the completion store
//! dedup check, then is handed to the executor. The caller learns the
//! verdict only from the task's result receiver.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use opentelemetry::KeyValue;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{ExecutionContext, Executor, Job};
use crate::config::{ExecutorConfig, Mode};
use crate::error::{Error, Result};
use crate::model::{Task, TaskId};
use crate::oracle::OutcomeOracle;
use crate::store::CompletionStore;
use crate::telemetry::metrics;

type AdmissionSet = Arc<Mutex<HashSet<TaskId>>>;

/// Holds a task id in the admitted set until dropped.
#[derive(Debug)]
pub struct Admission {
    id: TaskId,
    set: AdmissionSet,
}

impl Admission {
    fn acquire(set: &AdmissionSet, id: TaskId) -> Result<Self> {
        let mut admitted = set.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !admitted.insert(id) {
            return Err(Error::InFlight(id));
        }
        Ok(Self {
            id,
            set: Arc::clone(set),
        })
    }

    /// An admission not tracked by any dispatcher.
    #[cfg(test)]
    pub(crate) fn detached(id: TaskId) -> Self {
        Self {
            id,
            set: Arc::new(Mutex::new(HashSet::from([id]))),
        }
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.id);
    }
}

/// Owns the executor and the completion store handle.
pub struct Dispatcher {
    executor: Executor,
    store: Arc<dyn CompletionStore>,
    admitted: AdmissionSet,
}

impl Dispatcher {
    pub fn new(
        config: ExecutorConfig,
        store: Arc<dyn CompletionStore>,
        oracle: Arc<dyn OutcomeOracle>,
    ) -> Self {
        let ctx = ExecutionContext::new(config, Arc::clone(&store), oracle);
        Self {
            executor: Executor::new(ctx),
            store,
            admitted: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Start the executor's drain loop.
    pub fn start(&self) -> Result<JoinHandle<()>> {
        let handle = self.executor.start()?;
        info!(mode = %self.mode(), "dispatcher started");
        Ok(handle)
    }

    /// Submit a task. `Ok` means it was queued and its receiver will resolve;
    /// on `Err` nothing was queued and the receiver never yields an outcome.
    pub async fn submit(&self, task: Task) -> Result<()> {
        let id = task.id;
        info!(task_id = %id, "submit");

        let result = self.admit(task).await;
        let label = match &result {
            Ok(()) => "ok",
            Err(e) => e.rejection_label(),
        };
        metrics::tasks_submitted().add(
            1,
            &[
                KeyValue::new("mode", self.mode().to_string()),
                KeyValue::new("result", label),
            ],
        );
        if let Err(ref e) = result {
            info!(task_id = %id, reason = %e, "submission rejected");
        }
        result
    }

    async fn admit(&self, task: Task) -> Result<()> {
        let admission = Admission::acquire(&self.admitted, task.id)?;

        match self.store.exists(task.id).await {
            Ok(false) => {}
            Ok(true) => return Err(Error::DuplicateSubmission(task.id)),
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "dedup check failed, denying submission");
                return Err(Error::StoreUnavailable(e.to_string()));
            }
        }

        self.executor.enqueue(Job { task, admission })
    }

    /// Fire the executor's one-shot stop signal.
    pub fn shutdown(&self) {
        self.executor.shutdown();
    }

    pub fn mode(&self) -> Mode {
        self.executor.mode()
    }

    pub fn is_stopped(&self) -> bool {
        self.executor.is_stopped()
    }

    /// Ids admitted and not yet terminal.
    pub fn in_flight(&self) -> usize {
        self.admitted.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_is_exclusive_until_dropped() {
        let set: AdmissionSet = Arc::new(Mutex::new(HashSet::new()));
        let first = Admission::acquire(&set, TaskId(7)).unwrap();
        assert!(matches!(
            Admission::acquire(&set, TaskId(7)),
            Err(Error::InFlight(TaskId(7)))
        ));
        assert!(Admission::acquire(&set, TaskId(8)).is_ok());

        drop(first);
        assert!(Admission::acquire(&set, TaskId(7)).is_ok());
    }

    #[test]
    fn poisoned_set_still_releases_admission() {
        let set: AdmissionSet = Arc::new(Mutex::new(HashSet::new()));
        let held = Admission::acquire(&set, TaskId(3)).unwrap();

        let poisoner = Arc::clone(&set);
        let _ = std::thread::spawn(move || {
            let _lock = poisoner.lock().unwrap();
            panic!("poison the admission set");
        })
        .join();
        assert!(set.is_poisoned());

        drop(held);
        assert!(Admission::acquire(&set, TaskId(3)).is_ok());
    }
}
