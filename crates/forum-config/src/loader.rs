//! Configuration loader with layered sources.

use crate::{AppConfig, ConfigValidator};
use config::{Config, ConfigError, Environment, File};
use forum_core::ForumError;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Prefix of every environment variable the loader reads.
pub const ENV_PREFIX: &str = "FORUM";

/// Configuration loader with runtime refresh support.
#[derive(Clone)]
pub struct ConfigLoader {
    config: Arc<RwLock<AppConfig>>,
    config_dir: String,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from multiple sources in order:
    /// 1. `config/default.toml` - Default values
    /// 2. `config/{environment}.toml` - Environment-specific overrides
    /// 3. `config/local.toml` - Untracked local overrides
    /// 4. Environment variables such as `FORUM_MAIL_QUEUE__BATCH_SIZE`
    pub fn new(config_dir: impl Into<String>) -> Result<Self, ForumError> {
        let config_dir = config_dir.into();
        let config = Self::load_config(&config_dir)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_dir,
        })
    }

    /// Loads configuration from the default location (`./config`).
    pub fn from_default_location() -> Result<Self, ForumError> {
        Self::new("./config")
    }

    /// Returns the current configuration.
    pub async fn get(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    /// Reloads the configuration from disk. The previous configuration stays
    /// in place when the new one fails to load or validate.
    pub async fn reload(&self) -> Result<(), ForumError> {
        let new_config = Self::load_config(&self.config_dir)?;
        let mut config = self.config.write().await;
        *config = new_config;
        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Loads configuration from the specified directory.
    fn load_config(config_dir: &str) -> Result<AppConfig, ForumError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment = std::env::var(format!("{ENV_PREFIX}_ENVIRONMENT"))
            .unwrap_or_else(|_| "development".to_string());

        info!(environment = %environment, "Loading configuration");

        let mut builder = Config::builder();

        for name in ["default", environment.as_str(), "local"] {
            let path = format!("{}/{}.toml", config_dir, name);
            if Path::new(&path).exists() {
                debug!("Loading config from: {}", path);
                builder = builder.add_source(File::with_name(&path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_error_to_forum_error)?;

        let mut app_config: AppConfig = config
            .try_deserialize()
            .map_err(config_error_to_forum_error)?;
        app_config.app.environment = environment;

        Self::validate_config(&app_config)?;

        Ok(app_config)
    }

    /// Validates the configuration.
    fn validate_config(config: &AppConfig) -> Result<(), ForumError> {
        if config.app.is_production() && !config.database.is_configured() {
            warn!("No database configured in production; queued mail will not survive a restart");
        }
        if config.app.is_production() && !config.smtp.enabled {
            warn!("SMTP disabled in production; mail will only be logged");
        }

        ConfigValidator::validate(config).map_err(|errors| {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            ForumError::Configuration(message)
        })
    }

    /// Gets a specific configuration value by key path.
    pub async fn get_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let config = self.config.read().await;
        let json = serde_json::to_value(&*config).ok()?;

        let mut current = &json;
        for part in key.split('.') {
            current = current.get(part)?;
        }

        serde_json::from_value(current.clone()).ok()
    }
}

fn config_error_to_forum_error(err: ConfigError) -> ForumError {
    ForumError::Configuration(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_default(dir: &Path, contents: &str) {
        fs::write(dir.join("default.toml"), contents).unwrap();
    }

    #[tokio::test]
    async fn test_loads_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write_default(
            dir.path(),
            r#"
[mail_queue]
batch_size = 42
backoff_base_secs = 60

[smtp]
from_address = "noreply@forum.test"
"#,
        );

        let loader = ConfigLoader::new(dir.path().to_string_lossy()).unwrap();
        let config = loader.get().await;
        assert_eq!(config.mail_queue.batch_size, 42);
        assert_eq!(config.mail_queue.backoff_base_secs, 60);
        assert_eq!(config.mail_queue.max_attempts, 3);
        assert_eq!(config.smtp.from_address, "noreply@forum.test");
    }

    #[tokio::test]
    async fn test_missing_directory_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path().join("absent").to_string_lossy()).unwrap();
        let config = loader.get().await;
        assert_eq!(config.mail_queue.batch_size, 10);
    }

    #[tokio::test]
    async fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_default(dir.path(), "[mail_queue]\nbatch_size = 500\n");

        let err = ConfigLoader::new(dir.path().to_string_lossy())
            .err()
            .unwrap();
        match err {
            ForumError::Configuration(msg) => assert!(msg.contains("batch_size")),
            other => panic!("Expected configuration error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reload_picks_up_changes() {
        let dir = tempfile::tempdir().unwrap();
        write_default(dir.path(), "[mail_queue]\nconcurrency = 2\n");
        let loader = ConfigLoader::new(dir.path().to_string_lossy()).unwrap();
        assert_eq!(loader.get().await.mail_queue.concurrency, 2);

        write_default(dir.path(), "[mail_queue]\nconcurrency = 8\n");
        loader.reload().await.unwrap();
        assert_eq!(loader.get().await.mail_queue.concurrency, 8);
    }

    #[tokio::test]
    async fn test_get_value_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path().to_string_lossy()).unwrap();
        let attempts: Option<u32> = loader.get_value("mail_queue.max_attempts").await;
        assert_eq!(attempts, Some(3));
        let missing: Option<u32> = loader.get_value("mail_queue.nope").await;
        assert!(missing.is_none());
    }
}
