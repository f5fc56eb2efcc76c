use crate::ports::{AppConfig, ConfigError, ConfigResult, ConfigStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    api_base_url: Option<String>,
    page_size: Option<u32>,
    request_timeout_seconds: Option<u64>,
}

/// Reads and writes `config.json` under the user's config directory.
pub struct FileConfigStore {
    config_path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> ConfigResult<Self> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            ConfigError::ReadError("Cannot determine config directory".to_string())
        })?;

        Ok(Self::with_path(config_dir.join("taskboard").join("config.json")))
    }

    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    async fn ensure_config_dir(&self) -> ConfigResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load_config(&self) -> ConfigResult<AppConfig> {
        let content = match fs::read_to_string(&self.config_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", self.config_path.display());
                return Ok(AppConfig::default());
            }
            Err(e) => return Err(ConfigError::ReadError(e.to_string())),
        };

        let config_file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;

        let defaults = AppConfig::default();
        Ok(AppConfig {
            api_base_url: config_file.api_base_url.unwrap_or(defaults.api_base_url),
            page_size: config_file
                .page_size
                .filter(|size| *size > 0)
                .unwrap_or(defaults.page_size),
            request_timeout_seconds: config_file
                .request_timeout_seconds
                .filter(|seconds| *seconds > 0)
                .unwrap_or(defaults.request_timeout_seconds),
        })
    }

    async fn save_config(&self, config: &AppConfig) -> ConfigResult<()> {
        self.ensure_config_dir().await?;

        let config_file = ConfigFile {
            api_base_url: Some(config.api_base_url.clone()),
            page_size: Some(config.page_size),
            request_timeout_seconds: Some(config.request_timeout_seconds),
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }
}
