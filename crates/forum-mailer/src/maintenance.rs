//! Operator-facing queue maintenance: stats, listing, cancellation, cleanup.

use crate::error::{MailError, MailResult};
use crate::metrics::MailMetrics;
use chrono::{DateTime, Utc};
use forum_core::{MailJob, MailJobId, Page, PageRequest};
use forum_repository::{MailJobFilter, MailQueueStore, QueueStats};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Accepted values for the cleanup age, in days.
pub const CLEANUP_DAYS_RANGE: RangeInclusive<u32> = 1..=365;

/// Outcome of a cleanup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub deleted_count: u64,
}

/// Read and prune access to the queue.
#[derive(Clone)]
pub struct MailQueueMaintenance {
    store: Arc<dyn MailQueueStore>,
}

impl MailQueueMaintenance {
    /// Create a maintenance handle over a store.
    pub fn new(store: Arc<dyn MailQueueStore>) -> Self {
        Self { store }
    }

    /// Queue totals. `today` counts jobs created since 00:00 UTC.
    pub async fn stats(&self) -> MailResult<QueueStats> {
        let stats = self.store.stats(start_of_day(Utc::now())).await?;
        MailMetrics::update_queue_sizes(&stats);
        Ok(stats)
    }

    /// Delete `Failed` jobs created more than `older_than_days` days ago.
    #[instrument(skip(self))]
    pub async fn cleanup(&self, older_than_days: u32) -> MailResult<CleanupReport> {
        if !CLEANUP_DAYS_RANGE.contains(&older_than_days) {
            return Err(MailError::Validation(format!(
                "older_than_days must be between {} and {}, got {}",
                CLEANUP_DAYS_RANGE.start(),
                CLEANUP_DAYS_RANGE.end(),
                older_than_days
            )));
        }

        let cutoff = Utc::now() - chrono::Duration::days(i64::from(older_than_days));
        let deleted_count = self.store.delete_failed_before(cutoff).await?;
        MailMetrics::cleaned(deleted_count);
        info!(deleted_count, %cutoff, "Failed mail jobs cleaned up");
        Ok(CleanupReport { deleted_count })
    }

    /// Jobs matching `filter`, newest first.
    pub async fn list(&self, filter: &MailJobFilter, page: PageRequest) -> MailResult<Page<MailJob>> {
        Ok(self.store.list(filter, page).await?)
    }

    /// One job by ID.
    pub async fn get(&self, id: MailJobId) -> MailResult<Option<MailJob>> {
        Ok(self.store.find_by_id(id).await?)
    }

    /// Cancel a pending job.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: MailJobId) -> MailResult<MailJob> {
        let job = self.store.cancel(id).await?;
        info!(job_id = %job.id, recipient = %job.recipient, "Mail job cancelled");
        Ok(job)
    }

    /// Return jobs stuck in `Sending` for longer than `claim_ttl` to
    /// `Pending`. The interrupted attempt is not counted.
    pub async fn release_stale_claims(&self, claim_ttl: Duration) -> MailResult<u64> {
        let ttl = chrono::Duration::from_std(claim_ttl)
            .map_err(|e| MailError::Validation(format!("claim TTL out of range: {}", e)))?;
        let released = self.store.release_stale_claims(Utc::now() - ttl).await?;
        if released > 0 {
            MailMetrics::claims_released(released);
            info!(released, "Released stale mail claims");
        }
        Ok(released)
    }
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use forum_core::{Email, MailCategory, MailState};
    use forum_repository::InMemoryMailQueueStore;

    fn job(to: &str) -> MailJob {
        MailJob::new(
            Email::new(to).unwrap(),
            "Subject",
            "<p>Body</p>",
            MailCategory::Announcement,
        )
    }

    async fn insert_failed(store: &InMemoryMailQueueStore, to: &str, age_days: i64) -> MailJob {
        let mut failed = job(to);
        failed.created_at = Utc::now() - ChronoDuration::days(age_days);
        failed.scheduled_at = failed.created_at;
        store.insert(&failed).await.unwrap();

        let mut claimed = store
            .claim_due(Utc::now(), 100)
            .await
            .unwrap()
            .into_iter()
            .find(|j| j.id == failed.id)
            .unwrap();
        let claimed_at = claimed.claimed_at.unwrap();
        claimed.record_failure("550 mailbox unavailable", None).unwrap();
        assert!(store.complete_attempt(&claimed, claimed_at).await.unwrap());
        claimed
    }

    #[test]
    fn test_start_of_day() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        assert_eq!(
            start_of_day(now),
            Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_cleanup_only_deletes_old_failed() {
        let store = Arc::new(InMemoryMailQueueStore::new());
        let maintenance = MailQueueMaintenance::new(store.clone());

        let old_failed = insert_failed(&store, "old@example.com", 10).await;
        let recent_failed = insert_failed(&store, "recent@example.com", 2).await;

        let mut old_pending = job("pending@example.com");
        old_pending.created_at = Utc::now() - ChronoDuration::days(30);
        old_pending.scheduled_at = Utc::now() + ChronoDuration::days(1);
        store.insert(&old_pending).await.unwrap();

        let mut old_sent = job("sent@example.com");
        old_sent.created_at = Utc::now() - ChronoDuration::days(30);
        old_sent.state = MailState::Sent;
        old_sent.sent_at = Some(old_sent.created_at);
        store.insert(&old_sent).await.unwrap();

        let mut old_cancelled = job("cancelled@example.com");
        old_cancelled.created_at = Utc::now() - ChronoDuration::days(30);
        old_cancelled.state = MailState::Cancelled;
        store.insert(&old_cancelled).await.unwrap();

        let report = maintenance.cleanup(7).await.unwrap();
        assert_eq!(report.deleted_count, 1);
        assert!(maintenance.get(old_failed.id).await.unwrap().is_none());
        assert!(maintenance.get(recent_failed.id).await.unwrap().is_some());
        assert!(maintenance.get(old_pending.id).await.unwrap().is_some());
        assert!(maintenance.get(old_sent.id).await.unwrap().is_some());
        assert!(maintenance.get(old_cancelled.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cleanup_rejects_out_of_range() {
        let maintenance = MailQueueMaintenance::new(Arc::new(InMemoryMailQueueStore::new()));
        assert!(matches!(maintenance.cleanup(0).await, Err(MailError::Validation(_))));
        assert!(matches!(maintenance.cleanup(366).await, Err(MailError::Validation(_))));
        assert!(maintenance.cleanup(365).await.is_ok());
    }

    #[tokio::test]
    async fn test_stats() {
        let store = Arc::new(InMemoryMailQueueStore::new());
        let maintenance = MailQueueMaintenance::new(store.clone());
        insert_failed(&store, "c@example.com", 3).await;
        store.insert(&job("a@example.com")).await.unwrap();
        store.insert(&job("b@example.com")).await.unwrap();

        let stats = maintenance.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.today, 2);
        assert_eq!(stats.count(MailState::Pending), 2);
        assert_eq!(stats.count(MailState::Failed), 1);
        assert_eq!(stats.count(MailState::Sent), 0);
    }

    #[tokio::test]
    async fn test_cancel_and_list() {
        let store = Arc::new(InMemoryMailQueueStore::new());
        let maintenance = MailQueueMaintenance::new(store.clone());
        let pending = job("cancel@example.com");
        store.insert(&pending).await.unwrap();

        let cancelled = maintenance.cancel(pending.id).await.unwrap();
        assert_eq!(cancelled.state, MailState::Cancelled);
        assert!(matches!(
            maintenance.cancel(pending.id).await,
            Err(MailError::InvalidState { .. })
        ));
        assert!(matches!(
            maintenance.cancel(MailJobId::new()).await,
            Err(MailError::NotFound(_))
        ));

        let page = maintenance
            .list(
                &MailJobFilter::all().with_state(MailState::Cancelled),
                PageRequest::first(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.content[0].id, pending.id);
    }

    #[tokio::test]
    async fn test_release_stale_claims() {
        let store = Arc::new(InMemoryMailQueueStore::new());
        let maintenance = MailQueueMaintenance::new(store.clone());
        store.insert(&job("stale@example.com")).await.unwrap();
        let claimed = store.claim_due(Utc::now(), 1).await.unwrap();
        assert_eq!(claimed.len(), 1);

        assert_eq!(
            maintenance
                .release_stale_claims(Duration::from_secs(3600))
                .await
                .unwrap(),
            0
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(
            maintenance.release_stale_claims(Duration::ZERO).await.unwrap(),
            1
        );

        let stored = maintenance.get(claimed[0].id).await.unwrap().unwrap();
        assert_eq!(stored.state, MailState::Pending);
        assert_eq!(stored.retry_count, 0);
    }
}
