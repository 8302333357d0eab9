use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};
use tracing::debug;

use library_core::LibraryResult;
use library_domain::{
    entities::{QueueTask, TaskStatus},
    repositories::TaskQueueRepository,
};

pub struct PostgresTaskQueueRepository {
    pool: PgPool,
}

impl PostgresTaskQueueRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 初始化队列表结构
    pub async fn run_migrations(pool: &PgPool) -> LibraryResult<()> {
        debug!("Running PostgreSQL task queue migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS task_queue (
                id BIGSERIAL PRIMARY KEY,
                task_type VARCHAR(255) NOT NULL,
                payload JSONB NOT NULL DEFAULT '{}',
                status VARCHAR(20) NOT NULL DEFAULT 'PENDING',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_task_queue_status_created \
             ON task_queue(status, created_at)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    fn row_to_task(row: &sqlx::postgres::PgRow) -> LibraryResult<QueueTask> {
        Ok(QueueTask {
            id: row.try_get("id")?,
            task_type: row.try_get("task_type")?,
            payload: row.try_get("payload")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl TaskQueueRepository for PostgresTaskQueueRepository {
    async fn enqueue(&self, task_type: &str, payload: &Value) -> LibraryResult<()> {
        sqlx::query(
            "INSERT INTO task_queue (task_type, payload, status) VALUES ($1, $2, $3)",
        )
        .bind(task_type)
        .bind(payload)
        .bind(TaskStatus::Pending)
        .execute(&self.pool)
        .await?;

        debug!("任务已入队: type={}", task_type);
        Ok(())
    }

    async fn claim_one(&self) -> LibraryResult<Option<QueueTask>> {
        let row = sqlx::query(
            r#"
            UPDATE task_queue
            SET status = 'PROCESSING'
            WHERE id = (
                SELECT id FROM task_queue
                WHERE status = 'PENDING'
                ORDER BY created_at, id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, task_type, payload, status, created_at
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    async fn claim_batch(&self, limit: i64) -> LibraryResult<Vec<QueueTask>> {
        let rows = sqlx::query(
            r#"
            WITH next_tasks AS (
                SELECT id FROM task_queue
                WHERE status = 'PENDING'
                ORDER BY created_at, id
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE task_queue
            SET status = 'PROCESSING'
            WHERE id IN (SELECT id FROM next_tasks)
            RETURNING id, task_type, payload, status, created_at
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut tasks = rows
            .iter()
            .map(Self::row_to_task)
            .collect::<LibraryResult<Vec<_>>>()?;

        // RETURNING 不保证顺序，按认领序排好再交给消费者
        tasks.sort_by_key(|t| (t.created_at, t.id));

        debug!("认领任务批次: requested={}, claimed={}", limit, tasks.len());
        Ok(tasks)
    }

    async fn mark_done(&self, id: i64) -> LibraryResult<()> {
        let result = sqlx::query("UPDATE task_queue SET status = 'DONE' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        debug!(
            "标记任务完成: id={}, rows_affected={}",
            id,
            result.rows_affected()
        );
        Ok(())
    }
}
