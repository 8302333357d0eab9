use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use library_core::LibraryResult;
use library_domain::{
    entities::{QueueTask, TaskStatus},
    repositories::TaskQueueRepository,
};

/// SQLite 版任务队列仓储，用于嵌入式部署和测试
///
/// SQLite 对写入者串行化，单条 UPDATE 语句即是原子认领，
/// 不需要 PostgreSQL 的行级锁子句。
pub struct SqliteTaskQueueRepository {
    pool: SqlitePool,
}

impl SqliteTaskQueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 初始化队列表结构
    pub async fn run_migrations(pool: &SqlitePool) -> LibraryResult<()> {
        debug!("Running SQLite task queue migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS task_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_type TEXT NOT NULL,
                payload TEXT NOT NULL DEFAULT '{}',
                status TEXT NOT NULL DEFAULT 'PENDING',
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
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

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> LibraryResult<QueueTask> {
        let payload_text: String = row.try_get("payload")?;
        let payload = serde_json::from_str(&payload_text)?;

        Ok(QueueTask {
            id: row.try_get("id")?,
            task_type: row.try_get("task_type")?,
            payload,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl TaskQueueRepository for SqliteTaskQueueRepository {
    async fn enqueue(&self, task_type: &str, payload: &Value) -> LibraryResult<()> {
        sqlx::query(
            "INSERT INTO task_queue (task_type, payload, status, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(task_type)
        .bind(payload.to_string())
        .bind(TaskStatus::Pending)
        .bind(Utc::now())
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
            UPDATE task_queue
            SET status = 'PROCESSING'
            WHERE id IN (
                SELECT id FROM task_queue
                WHERE status = 'PENDING'
                ORDER BY created_at, id
                LIMIT ?1
            )
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
        let result = sqlx::query("UPDATE task_queue SET status = 'DONE' WHERE id = ?1")
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::HashSet;
    use std::sync::Arc;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        SqliteTaskQueueRepository::run_migrations(&pool).await.unwrap();
        pool
    }

    async fn insert_task_at(pool: &SqlitePool, task_type: &str, created_at: DateTime<Utc>) {
        sqlx::query(
            "INSERT INTO task_queue (task_type, payload, status, created_at) \
             VALUES (?1, '{}', 'PENDING', ?2)",
        )
        .bind(task_type)
        .bind(created_at)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn count_with_status(pool: &SqlitePool, status: &str) -> i64 {
        sqlx::query("SELECT COUNT(*) AS cnt FROM task_queue WHERE status = ?1")
            .bind(status)
            .fetch_one(pool)
            .await
            .unwrap()
            .get("cnt")
    }

    #[tokio::test]
    async fn test_enqueue_then_claim_batch_returns_fifo() {
        let pool = setup_test_db().await;
        let repo = SqliteTaskQueueRepository::new(pool.clone());

        repo.enqueue("A", &json!({"n": 1})).await.unwrap();
        repo.enqueue("B", &json!({"n": 2})).await.unwrap();
        repo.enqueue("C", &json!({"n": 3})).await.unwrap();

        let batch = repo.claim_batch(10).await.unwrap();
        assert_eq!(batch.len(), 3);
        let types: Vec<&str> = batch.iter().map(|t| t.task_type.as_str()).collect();
        assert_eq!(types, vec!["A", "B", "C"]);
        assert!(batch.iter().all(|t| t.status == TaskStatus::Processing));

        assert_eq!(count_with_status(&pool, "PROCESSING").await, 3);
        assert_eq!(count_with_status(&pool, "PENDING").await, 0);
    }

    #[tokio::test]
    async fn test_claim_batch_partitions_queue() {
        let pool = setup_test_db().await;
        let repo = SqliteTaskQueueRepository::new(pool);

        for i in 0..15 {
            repo.enqueue("AUDIT_LOG", &json!({"seq": i})).await.unwrap();
        }

        let first = repo.claim_batch(10).await.unwrap();
        assert_eq!(first.len(), 10);

        let second = repo.claim_batch(10).await.unwrap();
        assert_eq!(second.len(), 5);

        let third = repo.claim_batch(10).await.unwrap();
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn test_claim_batch_returns_oldest_first() {
        let pool = setup_test_db().await;
        let repo = SqliteTaskQueueRepository::new(pool.clone());

        let base = Utc::now();
        insert_task_at(&pool, "newest", base + Duration::seconds(20)).await;
        insert_task_at(&pool, "oldest", base - Duration::seconds(20)).await;
        insert_task_at(&pool, "middle", base).await;

        let batch = repo.claim_batch(2).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].task_type, "oldest");
        assert_eq!(batch[1].task_type, "middle");

        // 最新的一条仍然待处理
        assert_eq!(count_with_status(&pool, "PENDING").await, 1);
    }

    #[tokio::test]
    async fn test_claim_one_takes_single_oldest() {
        let pool = setup_test_db().await;
        let repo = SqliteTaskQueueRepository::new(pool.clone());

        repo.enqueue("first", &json!({})).await.unwrap();
        repo.enqueue("second", &json!({})).await.unwrap();

        let task = repo.claim_one().await.unwrap().unwrap();
        assert_eq!(task.task_type, "first");
        assert_eq!(task.status, TaskStatus::Processing);

        assert_eq!(count_with_status(&pool, "PENDING").await, 1);
        assert_eq!(count_with_status(&pool, "PROCESSING").await, 1);
    }

    #[tokio::test]
    async fn test_claim_on_empty_queue() {
        let pool = setup_test_db().await;
        let repo = SqliteTaskQueueRepository::new(pool);

        let batch = repo.claim_batch(10).await.unwrap();
        assert!(batch.is_empty());

        let task = repo.claim_one().await.unwrap();
        assert!(task.is_none());
    }

    #[tokio::test]
    async fn test_mark_done_is_idempotent() {
        let pool = setup_test_db().await;
        let repo = SqliteTaskQueueRepository::new(pool.clone());

        repo.enqueue("AUDIT_LOG", &json!({"x": 1})).await.unwrap();
        let task = repo.claim_one().await.unwrap().unwrap();

        repo.mark_done(task.id).await.unwrap();
        repo.mark_done(task.id).await.unwrap();

        assert_eq!(count_with_status(&pool, "DONE").await, 1);
    }

    #[tokio::test]
    async fn test_mark_done_unknown_id_is_noop() {
        let pool = setup_test_db().await;
        let repo = SqliteTaskQueueRepository::new(pool);

        assert!(repo.mark_done(9999).await.is_ok());
    }

    #[tokio::test]
    async fn test_payload_roundtrip() {
        let pool = setup_test_db().await;
        let repo = SqliteTaskQueueRepository::new(pool);

        let payload = json!({
            "timestamp": "2026-08-07T10:00:00Z",
            "action": "BORROW_COPY",
            "user_id": 7,
            "entity_id": 1234,
        });
        repo.enqueue("AUDIT_LOG", &payload).await.unwrap();

        let task = repo.claim_one().await.unwrap().unwrap();
        assert_eq!(task.payload, payload);
    }

    #[tokio::test]
    async fn test_concurrent_claims_are_exclusive() {
        let pool = setup_test_db().await;
        let repo = Arc::new(SqliteTaskQueueRepository::new(pool));

        for i in 0..20 {
            repo.enqueue("AUDIT_LOG", &json!({"seq": i})).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(
                async move { repo.claim_batch(5).await.unwrap() },
            ));
        }

        let batches = futures::future::join_all(handles).await;

        let mut seen = HashSet::new();
        let mut total = 0;
        for batch in batches {
            for task in batch.unwrap() {
                assert!(seen.insert(task.id), "task {} claimed twice", task.id);
                total += 1;
            }
        }
        assert_eq!(total, 20);
    }
}
