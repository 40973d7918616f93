//! Completion store: the durable set of task ids that reached `Completed`.
//!
//! The engine treats the store as an opaque key-existence oracle. An id is
//! present if and only if some execution path completed it; failed tasks
//! never write here and stay re-submittable.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::TaskId;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Existence/append contract consumed by the dispatcher and executors.
///
/// Implementations serialize concurrent `exists`/`add` calls themselves.
#[async_trait]
pub trait CompletionStore: Send + Sync {
    /// Has `id` already completed?
    async fn exists(&self, id: TaskId) -> Result<bool>;

    /// Record `id` as completed. Adding an id twice leaves one record.
    async fn add(&self, id: TaskId) -> Result<()>;

    /// All completed ids, in the order they were recorded.
    async fn entries(&self) -> Result<Vec<TaskId>>;

    /// Number of completion records.
    async fn count(&self) -> Result<u64>;

    /// Drop every record. Maintenance only; the engine never calls this.
    async fn clear(&self) -> Result<()>;
}
