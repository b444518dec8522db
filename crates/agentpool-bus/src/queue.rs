use crate::error::BusError;
use agentpool_shared::types::{QueueEntry, TaskId};
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, instrument};

/// Durable priority queue of `taskId`s (spec §4.A), backed by a
/// `task_queue` table indexed `(score DESC, queued_at ASC)`. `dequeue`
/// uses `SELECT ... FOR UPDATE SKIP LOCKED` so multiple coordinator
/// processes — if ever deployed — cannot double-dispatch (spec §5).
#[derive(Clone)]
pub struct DurableQueue {
    pool: PgPool,
    op_timeout: Duration,
}

impl DurableQueue {
    pub fn new(pool: PgPool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }

    /// Create the backing table if it doesn't exist yet. Idempotent; safe
    /// to call on every startup.
    pub async fn migrate(&self) -> Result<(), BusError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS task_queue (
                task_id TEXT PRIMARY KEY,
                score INTEGER NOT NULL,
                queued_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            CREATE INDEX IF NOT EXISTS task_queue_score_idx
                ON task_queue (score DESC, queued_at ASC);
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn enqueue(&self, task_id: &TaskId, score: i32) -> Result<(), BusError> {
        tokio::time::timeout(
            self.op_timeout,
            sqlx::query(
                "INSERT INTO task_queue (task_id, score) VALUES ($1, $2)
                 ON CONFLICT (task_id) DO UPDATE SET score = EXCLUDED.score",
            )
            .bind(&task_id.0)
            .bind(score)
            .execute(&self.pool),
        )
        .await
        .map_err(|_| BusError::Timeout(self.op_timeout))??;

        debug!(task_id = %task_id, score, "enqueued");
        Ok(())
    }

    /// Atomically remove and return the highest-scored entry, or `None` if
    /// the queue is empty.
    #[instrument(skip(self))]
    pub async fn dequeue(&self) -> Result<Option<TaskId>, BusError> {
        let row = tokio::time::timeout(
            self.op_timeout,
            sqlx::query_as::<_, (String,)>(
                "DELETE FROM task_queue
                 WHERE task_id = (
                     SELECT task_id FROM task_queue
                     ORDER BY score DESC, queued_at ASC
                     FOR UPDATE SKIP LOCKED
                     LIMIT 1
                 )
                 RETURNING task_id",
            )
            .fetch_optional(&self.pool),
        )
        .await
        .map_err(|_| BusError::Timeout(self.op_timeout))??;

        Ok(row.map(|(task_id,)| TaskId(task_id)))
    }

    pub async fn len(&self) -> Result<i64, BusError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM task_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Remove a specific entry if still present, e.g. a cancelled task that
    /// `ProcessQueue` drops after dequeuing (spec §4.F `ProcessQueue`).
    pub async fn remove(&self, task_id: &TaskId) -> Result<bool, BusError> {
        let result = sqlx::query("DELETE FROM task_queue WHERE task_id = $1")
            .bind(&task_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn snapshot(&self, limit: i64) -> Result<Vec<QueueEntry>, BusError> {
        let rows: Vec<(String, i32, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
            "SELECT task_id, score, queued_at FROM task_queue
             ORDER BY score DESC, queued_at ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(task_id, score, queued_at)| QueueEntry {
                task_id: TaskId(task_id),
                score,
                queued_at,
            })
            .collect())
    }
}
