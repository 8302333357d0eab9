//! Shared test utilities: in-memory mocks and entity builders.

pub mod builders;
pub mod mocks;

pub use builders::QueueTaskBuilder;
pub use mocks::{FailingLogStore, FailingTaskQueueRepository, MockTaskQueueRepository};
