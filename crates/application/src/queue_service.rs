//! 队列服务（生产者门面）
//!
//! 业务写路径通过这里记录异步任务，不感知队列表结构，
//! 也不等待最终的消费者。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use library_core::LibraryResult;
use library_domain::repositories::TaskQueueRepository;

/// 队列服务抽象
#[async_trait]
pub trait QueueService: Send + Sync {
    /// 入队一条任务，写入即返回
    async fn enqueue(&self, task_type: &str, payload: &Value) -> LibraryResult<()>;
}

/// 基于任务队列仓储的队列服务实现
pub struct PersistentQueueService {
    repository: Arc<dyn TaskQueueRepository>,
}

impl PersistentQueueService {
    pub fn new(repository: Arc<dyn TaskQueueRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl QueueService for PersistentQueueService {
    async fn enqueue(&self, task_type: &str, payload: &Value) -> LibraryResult<()> {
        self.repository.enqueue(task_type, payload).await?;
        debug!("队列服务入队成功: type={}", task_type);
        Ok(())
    }
}
