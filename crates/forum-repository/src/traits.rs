//! Store trait definitions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forum_core::{
    ForumResult, Interface, MailCategory, MailJob, MailJobId, MailState, Page, PageRequest,
    Recipient,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Optional filters for listing jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailJobFilter {
    /// Only jobs in this state.
    pub state: Option<MailState>,
    /// Only jobs with this category.
    pub category: Option<MailCategory>,
}

impl MailJobFilter {
    /// Matches every job.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts to one state.
    #[must_use]
    pub fn with_state(mut self, state: MailState) -> Self {
        self.state = Some(state);
        self
    }

    /// Restricts to one category.
    #[must_use]
    pub fn with_category(mut self, category: MailCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Checks a job against the filter.
    #[must_use]
    pub fn matches(&self, job: &MailJob) -> bool {
        self.state.map_or(true, |state| job.state == state)
            && self
                .category
                .as_ref()
                .map_or(true, |category| &job.category == category)
    }
}

/// Aggregate counts over the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// All jobs currently stored.
    pub total: u64,
    /// Jobs created since the start of the current UTC day.
    pub today: u64,
    /// Jobs per state. Every state is present, possibly with zero.
    pub by_state: BTreeMap<MailState, u64>,
}

impl QueueStats {
    /// Empty stats with every state at zero.
    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            total: 0,
            today: 0,
            by_state: MailState::all().into_iter().map(|s| (s, 0)).collect(),
        }
    }

    /// Count for one state.
    #[must_use]
    pub fn count(&self, state: MailState) -> u64 {
        self.by_state.get(&state).copied().unwrap_or(0)
    }
}

/// Durable storage for mail jobs.
///
/// Implementations must make [`claim_due`](Self::claim_due) atomic per job:
/// two concurrent callers never receive the same job.
#[async_trait]
pub trait MailQueueStore: Interface + Send + Sync {
    /// Persists a new pending job.
    async fn insert(&self, job: &MailJob) -> ForumResult<MailJob>;

    /// Claims up to `limit` due jobs, oldest first, moving them to `Sending`
    /// with `claimed_at = now`.
    async fn claim_due(&self, now: DateTime<Utc>, limit: u32) -> ForumResult<Vec<MailJob>>;

    /// Writes the outcome of an attempt. `job` carries the new state; the
    /// write only applies if the row is still `Sending` under the claim taken
    /// at `claimed_at`. Returns false when the claim was lost.
    async fn complete_attempt(&self, job: &MailJob, claimed_at: DateTime<Utc>) -> ForumResult<bool>;

    /// Finds a job by ID.
    async fn find_by_id(&self, id: MailJobId) -> ForumResult<Option<MailJob>>;

    /// Lists jobs, newest first.
    async fn list(&self, filter: &MailJobFilter, page: PageRequest) -> ForumResult<Page<MailJob>>;

    /// Counts jobs. `today_start` is the boundary for [`QueueStats::today`].
    async fn stats(&self, today_start: DateTime<Utc>) -> ForumResult<QueueStats>;

    /// Moves a pending job to `Cancelled`.
    ///
    /// Fails with `NotFound` for an unknown ID and `InvalidState` when the
    /// job is no longer pending.
    async fn cancel(&self, id: MailJobId) -> ForumResult<MailJob>;

    /// Returns `Sending` jobs claimed before `claimed_before` to `Pending`
    /// without counting an attempt.
    async fn release_stale_claims(&self, claimed_before: DateTime<Utc>) -> ForumResult<u64>;

    /// Deletes `Failed` jobs created before `created_before`. Other states are
    /// never deleted.
    async fn delete_failed_before(&self, created_before: DateTime<Utc>) -> ForumResult<u64>;
}

/// Source of bulk mail recipients.
#[async_trait]
pub trait RecipientDirectory: Interface + Send + Sync {
    /// All verified, non-blocked members.
    async fn active_recipients(&self) -> ForumResult<Vec<Recipient>>;
}
