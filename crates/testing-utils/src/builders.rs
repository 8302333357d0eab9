//! Builders for test entities

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use library_domain::entities::{QueueTask, TaskStatus};

/// Builder for QueueTask test instances
pub struct QueueTaskBuilder {
    id: i64,
    task_type: String,
    payload: Value,
    status: TaskStatus,
    created_at: DateTime<Utc>,
}

impl QueueTaskBuilder {
    pub fn new() -> Self {
        Self {
            id: 1,
            task_type: "AUDIT_LOG".to_string(),
            payload: json!({}),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn with_task_type(mut self, task_type: &str) -> Self {
        self.task_type = task_type.to_string();
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn build(self) -> QueueTask {
        QueueTask {
            id: self.id,
            task_type: self.task_type,
            payload: self.payload,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

impl Default for QueueTaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}
