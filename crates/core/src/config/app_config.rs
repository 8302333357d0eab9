use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::models::{ApiConfig, DatabaseConfig, LogStoreConfig, ObservabilityConfig, QueueConfig};

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub log_store: LogStoreConfig,
    pub api: ApiConfig,
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/library".to_string(),
                max_connections: 10,
                min_connections: 1,
                connection_timeout_seconds: 30,
                idle_timeout_seconds: 600,
            },
            queue: QueueConfig {
                enabled: true,
                batch_size: 10,
                poll_interval_seconds: 2,
            },
            log_store: LogStoreConfig {
                uri: "mongodb://localhost:27017".to_string(),
                database: "library_logs".to_string(),
                collection: "logs".to_string(),
            },
            api: ApiConfig {
                enabled: true,
                bind_address: "0.0.0.0:8080".to_string(),
                grpc_bind_address: "0.0.0.0:50051".to_string(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: LIBRARY_)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder()
            .set_default("database.url", "postgresql://localhost/library")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connection_timeout_seconds", 30)?
            .set_default("database.idle_timeout_seconds", 600)?
            .set_default("queue.enabled", true)?
            .set_default("queue.batch_size", 10)?
            .set_default("queue.poll_interval_seconds", 2)?
            .set_default("log_store.uri", "mongodb://localhost:27017")?
            .set_default("log_store.database", "library_logs")?
            .set_default("log_store.collection", "logs")?
            .set_default("api.enabled", true)?
            .set_default("api.bind_address", "0.0.0.0:8080")?
            .set_default("api.grpc_bind_address", "0.0.0.0:50051")?
            .set_default("observability.log_level", "info")?;

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            // 尝试默认配置文件路径
            let default_paths = [
                "config/library.toml",
                "library.toml",
                "/etc/library/config.toml",
            ];

            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        // 环境变量覆盖，例如 LIBRARY_DATABASE__URL
        builder = builder.add_source(
            Environment::with_prefix("LIBRARY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("构建配置失败")?;
        let app_config: AppConfig = config.try_deserialize().context("解析配置失败")?;

        app_config.validate()?;
        Ok(app_config)
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> Result<()> {
        self.database.validate()?;
        self.queue.validate()?;
        self.log_store.validate()?;
        self.api.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}
