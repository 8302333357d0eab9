pub mod sqlite_task_queue_repository;

pub use sqlite_task_queue_repository::SqliteTaskQueueRepository;
