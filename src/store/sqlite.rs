//! SQLite-backed completion store via SQLx.
//!
//! One `completedTasks` row per completed task id, with a secondary index on
//! `task_id` for the existence check. The pool holds a single connection, so
//! every read and write is serialized through it.

use std::str::FromStr;

use async_trait::async_trait;
use opentelemetry::KeyValue;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::debug;

use super::CompletionStore;
use crate::error::Result;
use crate::model::TaskId;
use crate::telemetry::metrics;

/// Durable completion store. Owns the connection pool.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url`, e.g.
    /// `sqlite://completedTasks.db` or `sqlite::memory:`.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Open and migrate in one step.
    pub async fn open(url: &str) -> Result<Self> {
        let store = Self::connect(url).await?;
        store.migrate().await?;
        Ok(store)
    }

    /// Create the table and index if they do not exist.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS completedTasks (
                id      INTEGER PRIMARY KEY,
                task_id INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_task_id ON completedTasks(task_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Round-trip a `SELECT 1` to confirm the database answers.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn record(operation: &'static str, ok: bool) {
    metrics::store_operations().add(
        1,
        &[
            KeyValue::new("operation", operation),
            KeyValue::new("result", if ok { "ok" } else { "error" }),
        ],
    );
}

#[async_trait]
impl CompletionStore for SqliteStore {
    async fn exists(&self, id: TaskId) -> Result<bool> {
        let row: std::result::Result<(i64,), sqlx::Error> =
            sqlx::query_as("SELECT COUNT(*) FROM completedTasks WHERE task_id = ?")
                .bind(id.0)
                .fetch_one(&self.pool)
                .await;
        record("exists", row.is_ok());
        Ok(row?.0 > 0)
    }

    async fn add(&self, id: TaskId) -> Result<()> {
        debug!(task_id = %id, "persisting completion");
        let inserted = sqlx::query(
            "INSERT INTO completedTasks (task_id)
             SELECT ? WHERE NOT EXISTS (SELECT 1 FROM completedTasks WHERE task_id = ?)",
        )
        .bind(id.0)
        .bind(id.0)
        .execute(&self.pool)
        .await;
        record("add", inserted.is_ok());
        if inserted?.rows_affected() == 0 {
            debug!(task_id = %id, "completion already recorded");
        }
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<TaskId>> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT task_id FROM completedTasks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| TaskId(id)).collect())
    }

    async fn count(&self) -> Result<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM completedTasks")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 as u64)
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM completedTasks")
            .execute(&self.pool)
            .await?;
        record("clear", true);
        Ok(())
    }
}
