//! 应用装配与生命周期
//!
//! 按固定顺序装配：连接池 -> 仓储 -> 队列服务 -> 审计记录器 -> Worker。
//! REST、RPC、检索、对象存储等表面由外部服务承载，这里只运行
//! 队列子系统本身。

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use library_application::{AuditLogger, PersistentQueueService, QueueService};
use library_core::AppConfig;
use library_infrastructure::{DatabasePool, MemoryLogStore};
use library_worker::{QueueWorker, QueueWorkerService};

use crate::shutdown::ShutdownManager;

/// 主应用程序
pub struct Application {
    config: AppConfig,
    pool: DatabasePool,
    queue_service: Arc<dyn QueueService>,
    audit_logger: Arc<AuditLogger>,
    log_store: Arc<MemoryLogStore>,
    worker: QueueWorker,
    shutdown: Arc<ShutdownManager>,
}

impl Application {
    /// 创建新的应用实例
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");

        // 创建数据库连接池（显式构造，随应用生命周期关闭）
        let pool = DatabasePool::new(&config.database.url, config.database.max_connections)
            .await
            .context("创建数据库连接池失败")?;
        pool.migrate().await.context("初始化队列表失败")?;

        // 创建仓储与服务
        let task_queue_repo = pool.task_queue_repository();
        let queue_service: Arc<dyn QueueService> =
            Arc::new(PersistentQueueService::new(Arc::clone(&task_queue_repo)));
        let audit_logger = Arc::new(AuditLogger::new(Arc::clone(&queue_service)));

        // 日志下游：外部文档库接入前使用进程内实现
        let log_store = Arc::new(MemoryLogStore::new());
        info!(
            "日志存储目标: {}/{}",
            config.log_store.database, config.log_store.collection
        );

        let worker = QueueWorker::builder(task_queue_repo, log_store.clone())
            .batch_size(config.queue.batch_size)
            .poll_interval(Duration::from_secs(config.queue.poll_interval_seconds))
            .build();

        Ok(Self {
            config,
            pool,
            queue_service,
            audit_logger,
            log_store,
            worker,
            shutdown: Arc::new(ShutdownManager::new()),
        })
    }

    pub fn queue_service(&self) -> Arc<dyn QueueService> {
        Arc::clone(&self.queue_service)
    }

    pub fn audit_logger(&self) -> Arc<AuditLogger> {
        Arc::clone(&self.audit_logger)
    }

    pub fn log_store(&self) -> Arc<MemoryLogStore> {
        Arc::clone(&self.log_store)
    }

    pub fn worker(&self) -> &QueueWorker {
        &self.worker
    }

    /// 启动组件并阻塞到收到关闭信号
    pub async fn run(&self) -> Result<()> {
        if self.config.queue.enabled {
            self.worker.start().await?;
        } else {
            info!("队列Worker已被配置禁用");
        }

        info!(
            "图书馆后端就绪: api={}, grpc={}",
            self.config.api.bind_address, self.config.api.grpc_bind_address
        );

        let mut shutdown_rx = self.shutdown.subscribe().await;

        // Ctrl+C 触发优雅关闭
        let shutdown = Arc::clone(&self.shutdown);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("监听关闭信号失败: {}", e);
                return;
            }
            shutdown.shutdown().await;
        });

        let _ = shutdown_rx.recv().await;
        info!("开始优雅关闭");

        self.worker.stop().await?;
        self.pool.close().await;

        info!("应用程序已退出");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use library_application::actions;
    use library_domain::repositories::LogStore;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();
        config.database.max_connections = 1;
        config.queue.poll_interval_seconds = 1;
        config
    }

    #[tokio::test]
    async fn test_audit_flow_reaches_log_store() {
        let app = Application::new(test_config()).await.unwrap();

        app.audit_logger()
            .log_action(actions::CREATE_BOOK, 1, 42)
            .await;
        app.audit_logger()
            .log_action(actions::BORROW_COPY, 7, 42)
            .await;

        app.worker().start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        app.worker().stop().await.unwrap();

        let logs = app.log_store().fetch_recent(10).await.unwrap();
        assert_eq!(logs.len(), 2);
        // 倒序返回：最近的在前
        assert_eq!(logs[0]["action"], "BORROW_COPY");
        assert_eq!(logs[1]["action"], "CREATE_BOOK");
    }
}
