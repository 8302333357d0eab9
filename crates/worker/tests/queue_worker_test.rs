use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use library_domain::repositories::TaskQueueRepository;
use library_infrastructure::MemoryLogStore;
use library_testing_utils::{FailingLogStore, MockTaskQueueRepository};
use library_worker::{QueueWorker, QueueWorkerService};

async fn enqueue_tasks(repo: &MockTaskQueueRepository, count: usize) {
    for i in 0..count {
        repo.enqueue("AUDIT_LOG", &json!({"seq": i})).await.unwrap();
    }
}

#[tokio::test]
async fn test_worker_drains_backlog_in_batches() {
    let repo = Arc::new(MockTaskQueueRepository::new());
    let log_store = Arc::new(MemoryLogStore::new());
    enqueue_tasks(&repo, 25).await;

    let worker = QueueWorker::builder(repo.clone(), log_store.clone())
        .batch_size(10)
        .poll_interval(Duration::from_millis(25))
        .build();

    worker.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    worker.stop().await.unwrap();

    assert_eq!(repo.done_count(), 25);
    assert_eq!(repo.pending_count(), 0);
    assert_eq!(log_store.total_entries().await, 25);
    assert_eq!(log_store.batch_sizes().await, vec![10, 10, 5]);
}

#[tokio::test]
async fn test_drain_pending_forwards_payloads_in_claim_order() {
    let repo = Arc::new(MockTaskQueueRepository::new());
    let log_store = Arc::new(MemoryLogStore::new());
    enqueue_tasks(&repo, 5).await;

    let worker = QueueWorker::builder(repo.clone(), log_store.clone()).build();

    let forwarded = worker.drain_pending().await.unwrap();
    assert_eq!(forwarded, 5);

    let entries = log_store.all_entries().await;
    let seqs: Vec<i64> = entries
        .iter()
        .map(|e| e["seq"].as_i64().unwrap())
        .collect();
    assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    assert_eq!(repo.done_count(), 5);
}

#[tokio::test]
async fn test_drain_pending_on_empty_queue_is_noop() {
    let repo = Arc::new(MockTaskQueueRepository::new());
    let log_store = Arc::new(MemoryLogStore::new());

    let worker = QueueWorker::builder(repo.clone(), log_store.clone()).build();

    let forwarded = worker.drain_pending().await.unwrap();
    assert_eq!(forwarded, 0);
    // 空批不向下游转发
    assert_eq!(log_store.batch_count().await, 0);
}

#[tokio::test]
async fn test_stop_waits_for_loop_exit_and_halts_claims() {
    let repo = Arc::new(MockTaskQueueRepository::new());
    let log_store = Arc::new(MemoryLogStore::new());
    enqueue_tasks(&repo, 3).await;

    let worker = QueueWorker::builder(repo.clone(), log_store.clone())
        .poll_interval(Duration::from_secs(5))
        .build();

    worker.start().await.unwrap();
    assert!(worker.is_running().await);

    // 首个周期立即执行，之后循环停在长间隔的睡眠里
    tokio::time::sleep(Duration::from_millis(50)).await;
    worker.stop().await.unwrap();
    assert!(!worker.is_running().await);

    let claims_at_stop = repo.claim_calls();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(repo.claim_calls(), claims_at_stop);
    assert_eq!(repo.done_count(), 3);
}

#[tokio::test]
async fn test_sink_failure_halts_worker_loop() {
    let repo = Arc::new(MockTaskQueueRepository::new());
    let log_store = Arc::new(FailingLogStore::new());
    enqueue_tasks(&repo, 12).await;

    let worker = QueueWorker::builder(repo.clone(), log_store)
        .batch_size(10)
        .poll_interval(Duration::from_millis(25))
        .build();

    worker.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    // 第一次转发失败即终止循环，不再认领后续任务
    assert!(!worker.is_running().await);
    assert_eq!(repo.claim_calls(), 1);
    assert_eq!(repo.done_count(), 10);
    assert_eq!(repo.pending_count(), 2);
}

#[tokio::test]
async fn test_mark_done_happens_before_forward() {
    let repo = Arc::new(MockTaskQueueRepository::new());
    enqueue_tasks(&repo, 5).await;

    let worker = QueueWorker::builder(repo.clone(), Arc::new(FailingLogStore::new())).build();

    let result = worker.drain_pending().await;
    assert!(result.is_err());
    assert!(result.unwrap_err().is_sink_error());

    // 转发失败时任务已经标记完成：这一批的负载随之丢失
    assert_eq!(repo.done_count(), 5);
    assert_eq!(repo.pending_count(), 0);
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let repo = Arc::new(MockTaskQueueRepository::new());
    let log_store = Arc::new(MemoryLogStore::new());

    let worker = QueueWorker::builder(repo, log_store)
        .poll_interval(Duration::from_secs(5))
        .build();

    worker.start().await.unwrap();
    assert!(worker.start().await.is_err());
    worker.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_when_not_running_is_noop() {
    let repo = Arc::new(MockTaskQueueRepository::new());
    let log_store = Arc::new(MemoryLogStore::new());

    let worker = QueueWorker::builder(repo, log_store).build();
    worker.stop().await.unwrap();
}

#[tokio::test]
async fn test_worker_can_restart_after_stop() {
    let repo = Arc::new(MockTaskQueueRepository::new());
    let log_store = Arc::new(MemoryLogStore::new());
    enqueue_tasks(&repo, 2).await;

    let worker = QueueWorker::builder(repo.clone(), log_store.clone())
        .poll_interval(Duration::from_millis(25))
        .build();

    worker.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    worker.stop().await.unwrap();
    assert_eq!(repo.done_count(), 2);

    enqueue_tasks(&repo, 2).await;
    worker.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    worker.stop().await.unwrap();
    assert_eq!(repo.done_count(), 4);
}
