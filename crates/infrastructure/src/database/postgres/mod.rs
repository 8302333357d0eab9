pub mod postgres_task_queue_repository;

pub use postgres_task_queue_repository::PostgresTaskQueueRepository;
