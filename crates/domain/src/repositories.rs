//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则

use async_trait::async_trait;
use serde_json::Value;

use crate::entities::QueueTask;
use library_core::LibraryResult;

/// 任务队列仓储抽象
///
/// 所有写操作各自构成一个原子单元，调用方不需要额外加锁；
/// 认领操作在多个并发消费者之间互斥，同一任务不会被认领两次。
#[async_trait]
pub trait TaskQueueRepository: Send + Sync {
    /// 插入一条 PENDING 任务，created_at 取当前时间
    async fn enqueue(&self, task_type: &str, payload: &Value) -> LibraryResult<()>;

    /// 原子认领最旧的一条 PENDING 任务并置为 PROCESSING；队列为空返回 None
    async fn claim_one(&self) -> LibraryResult<Option<QueueTask>>;

    /// 原子认领最多 limit 条最旧的 PENDING 任务，按 (created_at, id) 升序返回；
    /// 不足 limit 条时返回实际数量，没有待处理任务时返回空集而不是错误
    async fn claim_batch(&self, limit: i64) -> LibraryResult<Vec<QueueTask>>;

    /// 将任务置为 DONE；无状态前置条件，对已完成任务重复调用是幂等的
    async fn mark_done(&self, id: i64) -> LibraryResult<()>;
}

/// 日志存储端口（下游文档库，接收已处理任务的负载）
#[async_trait]
pub trait LogStore: Send + Sync {
    /// 批量追加日志文档
    async fn insert_logs(&self, entries: &[Value]) -> LibraryResult<()>;

    /// 按时间倒序取最近的日志
    async fn fetch_recent(&self, limit: i64) -> LibraryResult<Vec<Value>>;
}
