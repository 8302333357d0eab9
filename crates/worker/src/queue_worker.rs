//! 队列后台 Worker
//!
//! 单个后台轮询循环：按固定节拍批量认领 PENDING 任务，把任务负载
//! 整批转发到日志存储。整个进程只运行一个循环实例；认领逻辑本身
//! 支持多个并发消费者，部署方可以选择运行多个 Worker 进程。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info};

use library_core::{LibraryError, LibraryResult};
use library_domain::repositories::{LogStore, TaskQueueRepository};

/// 默认批大小
pub const DEFAULT_BATCH_SIZE: i64 = 10;
/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// 队列 Worker 服务接口
#[async_trait]
pub trait QueueWorkerService: Send + Sync {
    /// 启动后台轮询循环
    async fn start(&self) -> LibraryResult<()>;

    /// 停止循环并等待其完全退出后返回
    async fn stop(&self) -> LibraryResult<()>;

    /// 循环是否在运行
    async fn is_running(&self) -> bool;
}

/// Worker构建器
pub struct QueueWorkerBuilder {
    repository: Arc<dyn TaskQueueRepository>,
    log_store: Arc<dyn LogStore>,
    batch_size: i64,
    poll_interval: Duration,
}

impl QueueWorkerBuilder {
    pub fn new(repository: Arc<dyn TaskQueueRepository>, log_store: Arc<dyn LogStore>) -> Self {
        Self {
            repository,
            log_store,
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// 设置每个周期认领的最大任务数
    pub fn batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// 设置轮询间隔
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn build(self) -> QueueWorker {
        QueueWorker {
            repository: self.repository,
            log_store: self.log_store,
            batch_size: self.batch_size,
            poll_interval: self.poll_interval,
            shutdown_tx: Arc::new(RwLock::new(None)),
            loop_handle: Arc::new(Mutex::new(None)),
            is_running: Arc::new(RwLock::new(false)),
        }
    }
}

/// 队列 Worker 实现
#[derive(Clone)]
pub struct QueueWorker {
    /// 任务存储
    repository: Arc<dyn TaskQueueRepository>,

    /// 日志下游
    log_store: Arc<dyn LogStore>,

    /// 每周期认领上限
    batch_size: i64,

    /// 轮询间隔，批次满与不满都按同一节拍
    poll_interval: Duration,

    /// 停止信号
    shutdown_tx: Arc<RwLock<Option<broadcast::Sender<()>>>>,

    /// 轮询循环的句柄，stop() 等待它退出
    loop_handle: Arc<Mutex<Option<JoinHandle<()>>>>,

    /// 是否正在运行
    is_running: Arc<RwLock<bool>>,
}

impl QueueWorker {
    /// 创建构建器
    pub fn builder(
        repository: Arc<dyn TaskQueueRepository>,
        log_store: Arc<dyn LogStore>,
    ) -> QueueWorkerBuilder {
        QueueWorkerBuilder::new(repository, log_store)
    }

    /// 认领并处理一批任务，返回转发的任务数
    ///
    /// 认领到的每条任务先收集负载、再逐条标记 DONE，最后整批转发。
    /// 标记发生在转发之前：两步之间崩溃会丢掉这一批的负载，
    /// 换来的是任何任务都不会被重复转发。
    pub async fn drain_pending(&self) -> LibraryResult<usize> {
        let tasks = self.repository.claim_batch(self.batch_size).await?;
        if tasks.is_empty() {
            return Ok(0);
        }

        let mut entries = Vec::with_capacity(tasks.len());
        for task in &tasks {
            entries.push(task.payload.clone());
            self.repository.mark_done(task.id).await?;
        }

        self.log_store.insert_logs(&entries).await?;

        debug!("已转发任务批次: size={}", entries.len());
        Ok(entries.len())
    }

    /// 轮询循环体，只在独立的后台任务里运行
    async fn run_polling_loop(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut poll_interval = interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    if let Err(e) = self.drain_pending().await {
                        // 周期内的任何失败都终止循环；进程的其余部分继续运行
                        if e.is_sink_error() {
                            error!("日志存储写入失败，队列Worker停止处理: {}", e);
                        } else {
                            error!("队列轮询失败，队列Worker停止处理: {}", e);
                        }
                        break;
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("队列Worker收到停止信号");
                    break;
                }
            }
        }

        let mut is_running = self.is_running.write().await;
        *is_running = false;
    }
}

#[async_trait]
impl QueueWorkerService for QueueWorker {
    async fn start(&self) -> LibraryResult<()> {
        {
            let mut is_running = self.is_running.write().await;
            if *is_running {
                return Err(LibraryError::Internal("队列Worker已在运行".to_string()));
            }
            *is_running = true;
        }

        info!(
            "启动队列Worker: batch_size={}, poll_interval={:?}",
            self.batch_size, self.poll_interval
        );

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        {
            let mut tx_guard = self.shutdown_tx.write().await;
            *tx_guard = Some(shutdown_tx);
        }

        let worker = self.clone();
        let handle = tokio::spawn(async move {
            worker.run_polling_loop(shutdown_rx).await;
        });

        {
            let mut handle_guard = self.loop_handle.lock().await;
            *handle_guard = Some(handle);
        }

        Ok(())
    }

    async fn stop(&self) -> LibraryResult<()> {
        {
            let is_running = self.is_running.read().await;
            if !*is_running {
                return Ok(());
            }
        }

        info!("停止队列Worker");

        {
            let tx_guard = self.shutdown_tx.read().await;
            if let Some(ref shutdown_tx) = *tx_guard {
                let _ = shutdown_tx.send(());
            }
        }

        // 等待循环完全退出，保证返回之后不再有新的认领
        let handle = {
            let mut handle_guard = self.loop_handle.lock().await;
            handle_guard.take()
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("队列Worker循环退出异常: {}", e);
            }
        }

        {
            let mut tx_guard = self.shutdown_tx.write().await;
            *tx_guard = None;
        }
        {
            let mut is_running = self.is_running.write().await;
            *is_running = false;
        }

        info!("队列Worker已停止");
        Ok(())
    }

    async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }
}
