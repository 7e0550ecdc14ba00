//! Application assembly: stores, transport, dispatcher and maintenance.

use crate::di::{build_stores, Stores};
use forum_config::{AppConfig, SmtpConfig};
use forum_core::{ForumError, ForumResult};
use forum_mailer::{
    Dispatcher, LogMailTransport, MailError, MailQueue, MailQueueMaintenance, MailTransport,
    MaintenanceScheduler, SmtpMailTransport,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

/// The assembled mail service.
pub struct MailService {
    stores: Stores,
    queue: MailQueue,
    maintenance: MailQueueMaintenance,
    dispatcher: Arc<Dispatcher>,
    scheduler: Arc<MaintenanceScheduler>,
}

impl MailService {
    /// Builds every component from configuration.
    pub async fn build(config: &AppConfig) -> ForumResult<Self> {
        let stores = build_stores(&config.database).await?;
        let transport = build_transport(&config.smtp).map_err(into_forum_error)?;
        Self::assemble(stores, transport, config)
    }

    /// Wires already-built stores and transport.
    pub fn assemble(
        stores: Stores,
        transport: Arc<dyn MailTransport>,
        config: &AppConfig,
    ) -> ForumResult<Self> {
        let queue = MailQueue::new(stores.queue.clone());
        let maintenance = MailQueueMaintenance::new(stores.queue.clone());
        let dispatcher = Dispatcher::from_config(stores.queue.clone(), transport, &config.mail_queue)
            .map_err(into_forum_error)?;
        let scheduler = MaintenanceScheduler::from_config(maintenance.clone(), &config.mail_queue)
            .map_err(into_forum_error)?;

        Ok(Self {
            stores,
            queue,
            maintenance,
            dispatcher: Arc::new(dispatcher),
            scheduler: Arc::new(scheduler),
        })
    }

    /// Enqueue handle for callers embedding the service.
    pub fn queue(&self) -> &MailQueue {
        &self.queue
    }

    /// Maintenance handle.
    pub fn maintenance(&self) -> &MailQueueMaintenance {
        &self.maintenance
    }

    /// Storage components.
    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Runs the dispatcher and the maintenance scheduler until `shutdown`
    /// completes, then waits for both to stop.
    pub async fn run<F>(self, shutdown: F) -> ForumResult<()>
    where
        F: Future<Output = ()>,
    {
        let (shutdown_tx, _) = broadcast::channel(1);

        let dispatcher = Arc::clone(&self.dispatcher);
        let dispatcher_rx = shutdown_tx.subscribe();
        let dispatcher_task = tokio::spawn(async move { dispatcher.run(dispatcher_rx).await });

        let scheduler = Arc::clone(&self.scheduler);
        let scheduler_rx = shutdown_tx.subscribe();
        let scheduler_task = tokio::spawn(async move { scheduler.run(scheduler_rx).await });

        info!(durable = self.stores.is_durable(), "Mail service running");
        shutdown.await;

        let _ = shutdown_tx.send(());
        for (name, task) in [("dispatcher", dispatcher_task), ("scheduler", scheduler_task)] {
            if let Err(e) = task.await {
                error!(task = name, error = %e, "Mail service task ended abnormally");
            }
        }

        if let Some(pool) = &self.stores.pool {
            pool.close().await;
        }
        info!("Mail service stopped");
        Ok(())
    }
}

/// SMTP when enabled, otherwise a transport that only logs.
pub fn build_transport(config: &SmtpConfig) -> Result<Arc<dyn MailTransport>, MailError> {
    if config.enabled {
        Ok(Arc::new(SmtpMailTransport::new(config)?))
    } else {
        info!("SMTP disabled, mails will be logged instead of sent");
        Ok(Arc::new(LogMailTransport))
    }
}

fn into_forum_error(err: MailError) -> ForumError {
    match err {
        MailError::Store(inner) => inner,
        MailError::Configuration(msg) | MailError::Validation(msg) => ForumError::Configuration(msg),
        other => ForumError::Internal(other.to_string()),
    }
}
