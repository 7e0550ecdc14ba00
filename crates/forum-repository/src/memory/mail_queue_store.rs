//! In-memory mail queue store.

use crate::{MailJobFilter, MailQueueStore, QueueStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forum_core::{ForumError, ForumResult, MailJob, MailJobId, MailState, Page, PageRequest};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

/// Queue store kept in a single mutex-guarded map.
///
/// Every operation runs under the lock, which makes claims atomic across
/// tasks of one process. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryMailQueueStore {
    jobs: Mutex<HashMap<MailJobId, MailJob>>,
}

impl InMemoryMailQueueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Checks if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

#[async_trait]
impl MailQueueStore for InMemoryMailQueueStore {
    async fn insert(&self, job: &MailJob) -> ForumResult<MailJob> {
        let mut jobs = self.jobs.lock();
        if jobs.contains_key(&job.id) {
            return Err(ForumError::conflict(format!("Mail job {} already exists", job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(job.clone())
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: u32) -> ForumResult<Vec<MailJob>> {
        let mut jobs = self.jobs.lock();

        let mut due: Vec<(DateTime<Utc>, MailJobId)> = jobs
            .values()
            .filter(|job| job.is_due(now))
            .map(|job| (job.created_at, job.id))
            .collect();
        due.sort_unstable();
        due.truncate(limit as usize);

        let mut claimed = Vec::with_capacity(due.len());
        for (_, id) in due {
            if let Some(job) = jobs.get_mut(&id) {
                job.claim(now)?;
                claimed.push(job.clone());
            }
        }

        debug!(claimed = claimed.len(), "Claimed due mail jobs");
        Ok(claimed)
    }

    async fn complete_attempt(&self, job: &MailJob, claimed_at: DateTime<Utc>) -> ForumResult<bool> {
        let mut jobs = self.jobs.lock();
        match jobs.get_mut(&job.id) {
            Some(stored)
                if stored.state == MailState::Sending && stored.claimed_at == Some(claimed_at) =>
            {
                *stored = job.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_by_id(&self, id: MailJobId) -> ForumResult<Option<MailJob>> {
        Ok(self.jobs.lock().get(&id).cloned())
    }

    async fn list(&self, filter: &MailJobFilter, page: PageRequest) -> ForumResult<Page<MailJob>> {
        let jobs = self.jobs.lock();

        let mut matching: Vec<&MailJob> = jobs.values().filter(|job| filter.matches(job)).collect();
        matching.sort_unstable_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let total = matching.len() as u64;
        let content = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();

        Ok(Page::new(content, page, total))
    }

    async fn stats(&self, today_start: DateTime<Utc>) -> ForumResult<QueueStats> {
        let jobs = self.jobs.lock();
        let mut stats = QueueStats::zeroed();

        for job in jobs.values() {
            stats.total += 1;
            if job.created_at >= today_start {
                stats.today += 1;
            }
            *stats.by_state.entry(job.state).or_insert(0) += 1;
        }

        Ok(stats)
    }

    async fn cancel(&self, id: MailJobId) -> ForumResult<MailJob> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| ForumError::not_found("MailJob", id))?;
        job.cancel()?;
        Ok(job.clone())
    }

    async fn release_stale_claims(&self, claimed_before: DateTime<Utc>) -> ForumResult<u64> {
        let mut jobs = self.jobs.lock();
        let mut released = 0;

        for job in jobs.values_mut() {
            let stale = job.state == MailState::Sending
                && job.claimed_at.map_or(false, |at| at < claimed_before);
            if stale {
                job.release_claim()?;
                released += 1;
            }
        }

        Ok(released)
    }

    async fn delete_failed_before(&self, created_before: DateTime<Utc>) -> ForumResult<u64> {
        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.retain(|_, job| !(job.state == MailState::Failed && job.created_at < created_before));
        Ok((before - jobs.len()) as u64)
    }
}
