//! Periodic maintenance: cron-scheduled cleanup and stale-claim recovery.

use crate::error::{MailError, MailResult};
use crate::maintenance::MailQueueMaintenance;
use chrono::{DateTime, Utc};
use cron::Schedule;
use forum_config::MailQueueConfig;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// Runs queue maintenance on a timetable.
pub struct MaintenanceScheduler {
    maintenance: MailQueueMaintenance,
    cleanup_cron: String,
    schedule: Schedule,
    cleanup_older_than_days: u32,
    claim_ttl: Duration,
    stale_check_interval: Duration,
}

impl std::fmt::Debug for MaintenanceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceScheduler")
            .field("cleanup_cron", &self.cleanup_cron)
            .field("cleanup_older_than_days", &self.cleanup_older_than_days)
            .field("claim_ttl", &self.claim_ttl)
            .field("stale_check_interval", &self.stale_check_interval)
            .finish()
    }
}

impl MaintenanceScheduler {
    /// Create a scheduler. `cleanup_cron` uses the six-field
    /// `sec min hour day month weekday` format.
    pub fn new(
        maintenance: MailQueueMaintenance,
        cleanup_cron: &str,
        cleanup_older_than_days: u32,
        claim_ttl: Duration,
        stale_check_interval: Duration,
    ) -> MailResult<Self> {
        let schedule = Schedule::from_str(cleanup_cron)
            .map_err(|e| MailError::Configuration(format!("Invalid cron expression: {}", e)))?;
        if stale_check_interval.is_zero() {
            return Err(MailError::Configuration(
                "stale check interval must be positive".to_string(),
            ));
        }

        Ok(Self {
            maintenance,
            cleanup_cron: cleanup_cron.to_string(),
            schedule,
            cleanup_older_than_days,
            claim_ttl,
            stale_check_interval,
        })
    }

    /// Create a scheduler from the `mail_queue` configuration section.
    /// Stale claims are checked once per poll interval.
    pub fn from_config(
        maintenance: MailQueueMaintenance,
        config: &MailQueueConfig,
    ) -> MailResult<Self> {
        Self::new(
            maintenance,
            &config.cleanup_cron,
            config.cleanup_older_than_days,
            config.claim_ttl(),
            config.poll_interval(),
        )
    }

    /// Next cleanup time strictly after `after`.
    pub fn next_cleanup_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Run one cleanup now.
    pub async fn run_cleanup(&self) -> MailResult<u64> {
        let report = self.maintenance.cleanup(self.cleanup_older_than_days).await?;
        Ok(report.deleted_count)
    }

    /// Release stale claims now.
    pub async fn run_stale_check(&self) -> MailResult<u64> {
        self.maintenance.release_stale_claims(self.claim_ttl).await
    }

    /// Run until `shutdown` fires. Stale claims are checked immediately on
    /// start and then every `stale_check_interval`.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            cleanup_cron = %self.cleanup_cron,
            cleanup_older_than_days = self.cleanup_older_than_days,
            claim_ttl_secs = self.claim_ttl.as_secs(),
            "Mail maintenance scheduler started"
        );

        let mut stale_check = interval(self.stale_check_interval);
        stale_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let next_cleanup = self.next_cleanup_after(Utc::now());
            let until_cleanup = match next_cleanup {
                Some(at) => (at - Utc::now()).to_std().unwrap_or(Duration::ZERO),
                None => {
                    warn!(cron = %self.cleanup_cron, "Cleanup schedule has no upcoming run");
                    Duration::MAX
                }
            };

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Mail maintenance scheduler received shutdown signal");
                    break;
                }

                _ = stale_check.tick() => {
                    if let Err(e) = self.run_stale_check().await {
                        error!(error = %e, "Stale claim check failed");
                    }
                }

                _ = tokio::time::sleep(until_cleanup), if next_cleanup.is_some() => {
                    if let Err(e) = self.run_cleanup().await {
                        error!(error = %e, "Scheduled mail cleanup failed");
                    }
                }
            }
        }

        info!("Mail maintenance scheduler stopped");
    }
}
