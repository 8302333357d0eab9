use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),
    #[error("日志存储错误: {0}")]
    LogSink(String),
    #[error("任务未找到: {id}")]
    TaskNotFound { id: i64 },
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type LibraryResult<T> = Result<T, LibraryError>;

impl LibraryError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }

    pub fn log_sink_error<S: Into<String>>(msg: S) -> Self {
        Self::LogSink(msg.into())
    }

    pub fn task_not_found(id: i64) -> Self {
        Self::TaskNotFound { id }
    }

    /// 是否为任务存储（关系库）侧错误
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Self::Database(_) | Self::DatabaseOperation(_))
    }

    /// 是否为日志存储（文档库）侧错误
    pub fn is_sink_error(&self) -> bool {
        matches!(self, Self::LogSink(_))
    }
}

impl From<serde_json::Error> for LibraryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let storage = LibraryError::database_error("connection refused");
        assert!(storage.is_storage_error());
        assert!(!storage.is_sink_error());

        let sink = LibraryError::log_sink_error("insert rejected");
        assert!(sink.is_sink_error());
        assert!(!sink.is_storage_error());
    }

    #[test]
    fn test_task_not_found_display() {
        let err = LibraryError::task_not_found(42);
        assert!(err.to_string().contains("42"));
    }
}
