pub mod audit;
pub mod queue_service;

pub use audit::{actions, AuditLogger, AUDIT_LOG_TASK_TYPE};
pub use queue_service::{PersistentQueueService, QueueService};
