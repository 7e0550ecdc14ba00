//! Dependency injection using Shaku.
//!
//! With a database URL the MySQL components are wired through
//! [`MySqlQueueModule`]; without one the process runs on in-memory stores.

use forum_config::DatabaseConfig;
use forum_core::{module, ForumResult, HasComponent};
use forum_repository::{
    DatabasePool, DatabasePoolInterface, DatabasePoolParameters, InMemoryMailQueueStore,
    MailQueueStore, MySqlMailQueueStore, MySqlRecipientDirectory, RecipientDirectory,
    StaticRecipientDirectory,
};
use std::sync::Arc;
use tracing::{info, warn};

// MySQL-backed queue: pool, store and recipient directory.
module! {
    pub MySqlQueueModule {
        components = [
            DatabasePool,
            MySqlMailQueueStore,
            MySqlRecipientDirectory,
        ],
        providers = [],
    }
}

/// Resolved storage components.
#[derive(Clone)]
pub struct Stores {
    pub queue: Arc<dyn MailQueueStore>,
    pub directory: Arc<dyn RecipientDirectory>,
    /// Present only for MySQL.
    pub pool: Option<Arc<dyn DatabasePoolInterface>>,
}

impl Stores {
    /// In-process stores. Nothing survives a restart.
    pub fn in_memory() -> Self {
        Self {
            queue: Arc::new(InMemoryMailQueueStore::new()),
            directory: Arc::new(StaticRecipientDirectory::new(Vec::new())),
            pool: None,
        }
    }

    /// Whether jobs are persisted.
    pub fn is_durable(&self) -> bool {
        self.pool.is_some()
    }
}

/// Connects to MySQL and builds the module.
pub async fn build_mysql_module(config: &DatabaseConfig) -> ForumResult<Arc<MySqlQueueModule>> {
    let pool = DatabasePool::connect(config).await?;

    let module = MySqlQueueModule::builder()
        .with_component_parameters::<DatabasePool>(DatabasePoolParameters {
            pool: pool.inner().clone(),
        })
        .build();

    Ok(Arc::new(module))
}

/// Picks the store backend from configuration and applies migrations.
pub async fn build_stores(config: &DatabaseConfig) -> ForumResult<Stores> {
    if !config.is_configured() {
        warn!("No database URL configured, using the in-memory mail queue");
        return Ok(Stores::in_memory());
    }

    let module = build_mysql_module(config).await?;
    let pool: Arc<dyn DatabasePoolInterface> = module.resolve();
    if config.run_migrations {
        pool.run_migrations().await?;
    }
    pool.health_check().await?;
    info!("MySQL mail queue ready");

    Ok(Stores {
        queue: module.resolve(),
        directory: module.resolve(),
        pool: Some(pool),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_url_selects_memory() {
        let config = DatabaseConfig {
            url: String::new(),
            ..DatabaseConfig::default()
        };
        let stores = build_stores(&config).await.unwrap();
        assert!(!stores.is_durable());
        assert!(stores.directory.active_recipients().await.unwrap().is_empty());
    }
}
