pub mod queue_worker;

pub use queue_worker::{
    QueueWorker, QueueWorkerBuilder, QueueWorkerService, DEFAULT_BATCH_SIZE, DEFAULT_POLL_INTERVAL,
};
