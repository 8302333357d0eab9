//! 审计日志记录
//!
//! 业务操作（借还、建档、批量导入等）通过 AuditLogger 发出结构化
//! 审计事件。入队失败只记日志不上抛：审计链路的完整性是尽力而为，
//! 触发它的业务操作照常成功。

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::warn;

use crate::queue_service::QueueService;

/// 审计事件的任务类型标签
pub const AUDIT_LOG_TASK_TYPE: &str = "AUDIT_LOG";

/// 审计动作标签
pub mod actions {
    pub const CREATE_BOOK: &str = "CREATE_BOOK";
    pub const CREATE_MAGAZINE: &str = "CREATE_MAGAZINE";
    pub const CREATE_COPY: &str = "CREATE_COPY";
    pub const BORROW_COPY: &str = "BORROW_COPY";
    pub const RETURN_COPY: &str = "RETURN_COPY";
}

/// 审计日志记录器
pub struct AuditLogger {
    queue: Arc<dyn QueueService>,
}

impl AuditLogger {
    pub fn new(queue: Arc<dyn QueueService>) -> Self {
        Self { queue }
    }

    /// 记录一条审计事件
    ///
    /// 失败时只产生一条 warn 日志，永远不向调用方返回错误。
    pub async fn log_action(&self, action: &str, user_id: i64, entity_id: i64) {
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "action": action,
            "user_id": user_id,
            "entity_id": entity_id,
        });

        if let Err(e) = self.queue.enqueue(AUDIT_LOG_TASK_TYPE, &entry).await {
            warn!("审计日志入队失败: action={}, error={}", action, e);
        }
    }
}
