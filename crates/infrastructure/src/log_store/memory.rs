use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use library_core::LibraryResult;
use library_domain::repositories::LogStore;

/// 进程内日志存储
///
/// 按接收批次保存文档，供嵌入式部署和测试使用；
/// 生产部署用外部文档库实现同一端口。
#[derive(Debug, Clone, Default)]
pub struct MemoryLogStore {
    batches: Arc<RwLock<Vec<Vec<Value>>>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 收到的批次数
    pub async fn batch_count(&self) -> usize {
        self.batches.read().await.len()
    }

    /// 各批次的大小，按接收顺序
    pub async fn batch_sizes(&self) -> Vec<usize> {
        self.batches.read().await.iter().map(Vec::len).collect()
    }

    /// 文档总数
    pub async fn total_entries(&self) -> usize {
        self.batches.read().await.iter().map(Vec::len).sum()
    }

    /// 所有文档，按接收顺序拍平
    pub async fn all_entries(&self) -> Vec<Value> {
        self.batches
            .read()
            .await
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        self.batches.write().await.clear();
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn insert_logs(&self, entries: &[Value]) -> LibraryResult<()> {
        let mut batches = self.batches.write().await;
        batches.push(entries.to_vec());
        debug!("写入日志批次: size={}", entries.len());
        Ok(())
    }

    async fn fetch_recent(&self, limit: i64) -> LibraryResult<Vec<Value>> {
        let batches = self.batches.read().await;
        let mut entries: Vec<Value> = batches.iter().flatten().cloned().collect();
        entries.reverse();
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }
}
