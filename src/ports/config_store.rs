use async_trait::async_trait;
use thiserror::Error;

use crate::domain::DEFAULT_PAGE_SIZE;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    ReadError(String),

    #[error("Failed to write configuration: {0}")]
    WriteError(String),

    #[error("Invalid configuration format: {0}")]
    InvalidFormat(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_base_url: String,
    pub page_size: u32,
    pub request_timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_seconds: 30,
        }
    }
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load_config(&self) -> ConfigResult<AppConfig>;
    async fn save_config(&self, config: &AppConfig) -> ConfigResult<()>;
}
