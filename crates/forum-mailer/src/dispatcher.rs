//! Dispatcher: claims due jobs and delivers them.

use crate::error::{MailError, MailResult};
use crate::metrics::MailMetrics;
use crate::retry::RetryPolicy;
use crate::transport::{MailTransport, OutgoingMail};
use chrono::Utc;
use forum_config::MailQueueConfig;
use forum_core::{MailJob, MailState};
use forum_repository::MailQueueStore;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Largest batch a single pass may claim.
pub const MAX_BATCH_SIZE: u32 = 100;

/// Dispatcher tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherOptions {
    /// Jobs claimed per pass.
    pub batch_size: u32,

    /// Deliveries in flight at once.
    pub concurrency: usize,

    /// Upper bound for one transport call.
    pub delivery_timeout: Duration,

    /// Pause between passes that found less than a full batch.
    pub poll_interval: Duration,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            concurrency: 4,
            delivery_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(30),
        }
    }
}

impl From<&MailQueueConfig> for DispatcherOptions {
    fn from(config: &MailQueueConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            concurrency: config.concurrency,
            delivery_timeout: config.delivery_timeout(),
            poll_interval: config.poll_interval(),
        }
    }
}

/// Result of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Jobs claimed by this pass.
    pub processed: usize,
    pub succeeded: usize,
    /// Failed attempts rescheduled for later.
    pub retried: usize,
    /// Jobs that exhausted their attempts.
    pub failed: usize,
    /// Attempts whose outcome could not be written.
    pub skipped: usize,
}

impl DispatchReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Sent => self.succeeded += 1,
            Outcome::Retried => self.retried += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Sent,
    Retried,
    Failed,
    Skipped,
}

/// Delivers due jobs through a transport.
///
/// Several dispatchers may share one store: each job is claimed by exactly
/// one of them, and an attempt's outcome is only written while that claim
/// is still held.
pub struct Dispatcher {
    store: Arc<dyn MailQueueStore>,
    transport: Arc<dyn MailTransport>,
    policy: RetryPolicy,
    options: DispatcherOptions,
}

impl Dispatcher {
    /// Create a dispatcher.
    pub fn new(
        store: Arc<dyn MailQueueStore>,
        transport: Arc<dyn MailTransport>,
        policy: RetryPolicy,
        options: DispatcherOptions,
    ) -> Self {
        Self {
            store,
            transport,
            policy,
            options,
        }
    }

    /// Create a dispatcher from the `mail_queue` configuration section.
    pub fn from_config(
        store: Arc<dyn MailQueueStore>,
        transport: Arc<dyn MailTransport>,
        config: &MailQueueConfig,
    ) -> MailResult<Self> {
        let policy = RetryPolicy::try_from(config)?;
        Ok(Self::new(store, transport, policy, DispatcherOptions::from(config)))
    }

    /// The retry policy in use.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The tuning in use.
    pub fn options(&self) -> &DispatcherOptions {
        &self.options
    }

    /// Claim up to `batch_size` due jobs and attempt each once.
    ///
    /// Only a failure to claim is returned as an error; per-job problems
    /// are logged and counted in the report.
    #[instrument(skip(self), fields(transport = self.transport.name()))]
    pub async fn process_due(&self, batch_size: u32) -> MailResult<DispatchReport> {
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(MailError::Validation(format!(
                "batch size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, batch_size
            )));
        }

        let started = Instant::now();
        let jobs = self.store.claim_due(Utc::now(), batch_size).await?;
        if jobs.is_empty() {
            return Ok(DispatchReport::default());
        }

        let mut report = DispatchReport {
            processed: jobs.len(),
            ..Default::default()
        };
        debug!(claimed = jobs.len(), "Claimed due mail jobs");

        let outcomes: Vec<Outcome> = stream::iter(jobs)
            .map(|job| self.attempt(job))
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;
        for outcome in outcomes {
            report.record(outcome);
        }

        MailMetrics::dispatch_pass(started.elapsed());
        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            retried = report.retried,
            failed = report.failed,
            skipped = report.skipped,
            "Dispatch pass finished"
        );
        Ok(report)
    }

    /// Run passes until `shutdown` fires. A full batch is followed
    /// immediately by another pass; otherwise the loop waits
    /// `poll_interval`.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let batch_size = self.options.batch_size;
        info!(
            batch_size,
            concurrency = self.options.concurrency,
            poll_interval_secs = self.options.poll_interval.as_secs(),
            transport = self.transport.name(),
            "Mail dispatcher started"
        );

        loop {
            let pause = match self.process_due(batch_size).await {
                Ok(report) if report.processed >= batch_size as usize => Duration::ZERO,
                Ok(_) => self.options.poll_interval,
                Err(e) => {
                    error!(error = %e, "Dispatch pass failed");
                    self.options.poll_interval
                }
            };

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Mail dispatcher received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!("Mail dispatcher stopped");
    }

    async fn attempt(&self, job: MailJob) -> Outcome {
        let job_id = job.id;
        match self.try_attempt(job).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Failed to record delivery attempt");
                Outcome::Skipped
            }
        }
    }

    async fn try_attempt(&self, mut job: MailJob) -> MailResult<Outcome> {
        let claimed_at = job.claimed_at.ok_or_else(|| MailError::InvalidState {
            expected: MailState::Sending.to_string(),
            actual: format!("{} without claim", job.state),
        })?;
        let category = job.category.to_string();
        let attempt = job.retry_count + 1;

        let mail = OutgoingMail::from(&job);
        let started = Instant::now();
        let result = match timeout(self.options.delivery_timeout, self.transport.deliver(&mail)).await
        {
            Ok(result) => result,
            Err(_) => {
                MailMetrics::timed_out(&category);
                Err(MailError::Timeout(self.options.delivery_timeout))
            }
        };
        let elapsed = started.elapsed();

        let outcome = match &result {
            Ok(()) => {
                job.mark_sent(Utc::now())?;
                Outcome::Sent
            }
            Err(e) => {
                let retry_at = self.policy.next_attempt_at(Utc::now(), attempt);
                job.record_failure(e.to_string(), retry_at)?;
                if retry_at.is_some() {
                    Outcome::Retried
                } else {
                    Outcome::Failed
                }
            }
        };

        if !self.store.complete_attempt(&job, claimed_at).await? {
            MailMetrics::claim_lost();
            warn!(
                job_id = %job.id,
                attempt,
                "Claim lost before the attempt was recorded"
            );
            return Ok(Outcome::Skipped);
        }

        match (outcome, result) {
            (Outcome::Sent, _) => {
                MailMetrics::sent(&category, elapsed);
                info!(job_id = %job.id, recipient = %job.recipient, attempt, "Mail sent");
            }
            (Outcome::Retried, Err(e)) => {
                MailMetrics::attempt_failed(&category, elapsed, false);
                warn!(
                    job_id = %job.id,
                    recipient = %job.recipient,
                    attempt,
                    retry_at = %job.scheduled_at,
                    error = %e,
                    "Mail delivery failed, will retry"
                );
            }
            (_, Err(e)) => {
                MailMetrics::attempt_failed(&category, elapsed, true);
                error!(
                    job_id = %job.id,
                    recipient = %job.recipient,
                    attempt,
                    error = %e,
                    "Mail delivery failed permanently"
                );
            }
            (_, Ok(())) => {}
        }

        Ok(outcome)
    }
}
