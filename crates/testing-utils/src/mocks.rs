//! Mock implementations for the queue and log-store traits
//!
//! In-memory stand-ins that can be used for unit testing without a real
//! database connection or document store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use library_core::{LibraryError, LibraryResult};
use library_domain::entities::{QueueTask, TaskStatus};
use library_domain::repositories::{LogStore, TaskQueueRepository};

/// Mock implementation of TaskQueueRepository for testing
#[derive(Debug, Clone)]
pub struct MockTaskQueueRepository {
    tasks: Arc<Mutex<Vec<QueueTask>>>,
    next_id: Arc<Mutex<i64>>,
    claim_calls: Arc<AtomicUsize>,
}

impl MockTaskQueueRepository {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(Mutex::new(1)),
            claim_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_tasks(tasks: Vec<QueueTask>) -> Self {
        let max_id = tasks.iter().map(|t| t.id).max().unwrap_or(0);
        Self {
            tasks: Arc::new(Mutex::new(tasks)),
            next_id: Arc::new(Mutex::new(max_id + 1)),
            claim_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn clear(&self) {
        self.tasks.lock().unwrap().clear();
        *self.next_id.lock().unwrap() = 1;
    }

    pub fn count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub fn count_with_status(&self, status: TaskStatus) -> usize {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.status == status)
            .count()
    }

    pub fn pending_count(&self) -> usize {
        self.count_with_status(TaskStatus::Pending)
    }

    pub fn done_count(&self) -> usize {
        self.count_with_status(TaskStatus::Done)
    }

    /// Number of claim_one/claim_batch calls seen so far
    pub fn claim_calls(&self) -> usize {
        self.claim_calls.load(Ordering::SeqCst)
    }

    pub fn get_all_tasks(&self) -> Vec<QueueTask> {
        self.tasks.lock().unwrap().clone()
    }

    fn take_pending(&self, limit: usize) -> Vec<QueueTask> {
        let mut tasks = self.tasks.lock().unwrap();

        let mut pending: Vec<usize> = tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.status == TaskStatus::Pending)
            .map(|(i, _)| i)
            .collect();
        pending.sort_by_key(|&i| (tasks[i].created_at, tasks[i].id));
        pending.truncate(limit);

        let mut claimed = Vec::with_capacity(pending.len());
        for i in pending {
            tasks[i].status = TaskStatus::Processing;
            claimed.push(tasks[i].clone());
        }
        claimed
    }
}

impl Default for MockTaskQueueRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueueRepository for MockTaskQueueRepository {
    async fn enqueue(&self, task_type: &str, payload: &Value) -> LibraryResult<()> {
        let mut tasks = self.tasks.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();

        tasks.push(QueueTask {
            id: *next_id,
            task_type: task_type.to_string(),
            payload: payload.clone(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
        });
        *next_id += 1;
        Ok(())
    }

    async fn claim_one(&self) -> LibraryResult<Option<QueueTask>> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.take_pending(1).into_iter().next())
    }

    async fn claim_batch(&self, limit: i64) -> LibraryResult<Vec<QueueTask>> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.take_pending(limit.max(0) as usize))
    }

    async fn mark_done(&self, id: i64) -> LibraryResult<()> {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
            task.status = TaskStatus::Done;
        }
        Ok(())
    }
}

/// TaskQueueRepository whose every call fails with a storage error
#[derive(Debug, Clone, Default)]
pub struct FailingTaskQueueRepository;

impl FailingTaskQueueRepository {
    pub fn new() -> Self {
        Self
    }

    fn storage_error() -> LibraryError {
        LibraryError::database_error("storage unavailable")
    }
}

#[async_trait]
impl TaskQueueRepository for FailingTaskQueueRepository {
    async fn enqueue(&self, _task_type: &str, _payload: &Value) -> LibraryResult<()> {
        Err(Self::storage_error())
    }

    async fn claim_one(&self) -> LibraryResult<Option<QueueTask>> {
        Err(Self::storage_error())
    }

    async fn claim_batch(&self, _limit: i64) -> LibraryResult<Vec<QueueTask>> {
        Err(Self::storage_error())
    }

    async fn mark_done(&self, _id: i64) -> LibraryResult<()> {
        Err(Self::storage_error())
    }
}

/// LogStore whose every insert fails with a sink error
#[derive(Debug, Clone, Default)]
pub struct FailingLogStore;

impl FailingLogStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LogStore for FailingLogStore {
    async fn insert_logs(&self, _entries: &[Value]) -> LibraryResult<()> {
        Err(LibraryError::log_sink_error("log store unavailable"))
    }

    async fn fetch_recent(&self, _limit: i64) -> LibraryResult<Vec<Value>> {
        Err(LibraryError::log_sink_error("log store unavailable"))
    }
}
