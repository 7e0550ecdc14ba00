//! Mail job entity.

use super::super::value_objects::{Email, MailCategory, MailState};
use crate::{ForumError, ForumResult, MailJobId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque key/value data carried alongside a job for auditing.
pub type MailMetadata = serde_json::Map<String, serde_json::Value>;

/// One queued outbound email and its delivery state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailJob {
    /// Unique identifier, assigned on creation.
    pub id: MailJobId,

    /// Destination address.
    pub recipient: Email,

    /// Subject line.
    pub subject: String,

    /// HTML body.
    pub html_body: String,

    /// Optional plain-text alternative.
    pub text_body: Option<String>,

    /// Category tag.
    pub category: MailCategory,

    /// Opaque metadata, never interpreted by the queue.
    #[serde(default)]
    pub metadata: MailMetadata,

    /// Lifecycle state.
    pub state: MailState,

    /// Number of failed delivery attempts so far.
    pub retry_count: u32,

    /// Description of the most recent failure.
    pub last_error: Option<String>,

    /// Earliest time the job may be dispatched.
    pub scheduled_at: DateTime<Utc>,

    /// When the current claim was taken. Set only while `Sending`.
    pub claimed_at: Option<DateTime<Utc>>,

    /// Delivery time. Set exactly once, on `Sent`.
    pub sent_at: Option<DateTime<Utc>>,

    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl MailJob {
    /// Creates a pending job that is due immediately.
    #[must_use]
    pub fn new(
        recipient: Email,
        subject: impl Into<String>,
        html_body: impl Into<String>,
        category: MailCategory,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: MailJobId::new(),
            recipient,
            subject: subject.into(),
            html_body: html_body.into(),
            text_body: None,
            category,
            metadata: MailMetadata::new(),
            state: MailState::Pending,
            retry_count: 0,
            last_error: None,
            scheduled_at: now,
            claimed_at: None,
            sent_at: None,
            created_at: now,
        }
    }

    /// Sets the plain-text alternative.
    #[must_use]
    pub fn with_text_body(mut self, text_body: Option<String>) -> Self {
        self.text_body = text_body;
        self
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: MailMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Defers the first attempt. Times before creation are clamped to the
    /// creation time.
    #[must_use]
    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = at.max(self.created_at);
        self
    }

    /// Whether a dispatcher may claim this job at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == MailState::Pending && self.scheduled_at <= now
    }

    /// Checks if the job reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// `Pending -> Sending`.
    pub fn claim(&mut self, now: DateTime<Utc>) -> ForumResult<()> {
        self.expect_state(MailState::Pending)?;
        self.state = MailState::Sending;
        self.claimed_at = Some(now);
        Ok(())
    }

    /// `Sending -> Sent`.
    pub fn mark_sent(&mut self, now: DateTime<Utc>) -> ForumResult<()> {
        self.expect_state(MailState::Sending)?;
        self.state = MailState::Sent;
        self.sent_at = Some(now);
        self.claimed_at = None;
        Ok(())
    }

    /// Records a failed attempt.
    ///
    /// With `retry_at` the job goes back to `Pending`; `scheduled_at` never
    /// moves backwards. Without it the job is `Failed`.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        retry_at: Option<DateTime<Utc>>,
    ) -> ForumResult<()> {
        self.expect_state(MailState::Sending)?;
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_error = Some(error.into());
        self.claimed_at = None;
        match retry_at {
            Some(at) => {
                self.state = MailState::Pending;
                self.scheduled_at = self.scheduled_at.max(at);
            }
            None => self.state = MailState::Failed,
        }
        Ok(())
    }

    /// `Sending -> Pending` without counting an attempt. Used when a claim
    /// outlived its dispatcher.
    pub fn release_claim(&mut self) -> ForumResult<()> {
        self.expect_state(MailState::Sending)?;
        self.state = MailState::Pending;
        self.claimed_at = None;
        Ok(())
    }

    /// `Pending -> Cancelled`.
    pub fn cancel(&mut self) -> ForumResult<()> {
        self.expect_state(MailState::Pending)?;
        self.state = MailState::Cancelled;
        Ok(())
    }

    fn expect_state(&self, expected: MailState) -> ForumResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ForumError::invalid_state(expected, self.state))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn job() -> MailJob {
        MailJob::new(
            Email::new("reader@example.com").unwrap(),
            "Hello",
            "<p>Hello</p>",
            MailCategory::Welcome,
        )
    }

    #[test]
    fn test_new_job_is_pending_and_due() {
        let job = job();
        assert_eq!(job.state, MailState::Pending);
        assert_eq!(job.retry_count, 0);
        assert!(job.scheduled_at <= Utc::now());
        assert!(job.is_due(Utc::now()));
        assert!(job.sent_at.is_none());
    }

    #[test]
    fn test_past_schedule_is_clamped() {
        let job = job();
        let created = job.created_at;
        let job = job.scheduled_for(created - Duration::hours(3));
        assert_eq!(job.scheduled_at, created);
    }

    #[test]
    fn test_future_schedule_is_not_due() {
        let at = Utc::now() + Duration::minutes(30);
        let job = job().scheduled_for(at);
        assert!(!job.is_due(Utc::now()));
        assert!(job.is_due(at));
    }

    #[test]
    fn test_claim_then_send() {
        let mut job = job();
        let now = Utc::now();
        job.claim(now).unwrap();
        assert_eq!(job.state, MailState::Sending);
        assert_eq!(job.claimed_at, Some(now));

        job.mark_sent(now).unwrap();
        assert_eq!(job.state, MailState::Sent);
        assert_eq!(job.sent_at, Some(now));
        assert_eq!(job.retry_count, 0);
        assert!(job.claimed_at.is_none());
    }

    #[test]
    fn test_sent_is_terminal() {
        let mut job = job();
        let now = Utc::now();
        job.claim(now).unwrap();
        job.mark_sent(now).unwrap();

        assert!(job.claim(now).is_err());
        assert!(job.mark_sent(now + Duration::seconds(5)).is_err());
        assert!(job.record_failure("late", None).is_err());
        assert!(job.cancel().is_err());
        assert_eq!(job.sent_at, Some(now));
    }

    #[test]
    fn test_failure_with_retry_reschedules() {
        let mut job = job();
        let original = job.scheduled_at;
        job.claim(Utc::now()).unwrap();

        let retry_at = original + Duration::minutes(5);
        job.record_failure("connection refused", Some(retry_at)).unwrap();
        assert_eq!(job.state, MailState::Pending);
        assert_eq!(job.retry_count, 1);
        assert_eq!(job.scheduled_at, retry_at);
        assert_eq!(job.last_error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_retry_never_moves_schedule_backwards() {
        let at = Utc::now() + Duration::hours(1);
        let mut job = job().scheduled_for(at);
        job.claim(at).unwrap();
        job.record_failure("boom", Some(at - Duration::minutes(10))).unwrap();
        assert_eq!(job.scheduled_at, at);
    }

    #[test]
    fn test_failure_without_retry_is_terminal() {
        let mut job = job();
        job.claim(Utc::now()).unwrap();
        job.record_failure("mailbox unavailable", None).unwrap();
        assert_eq!(job.state, MailState::Failed);
        assert_eq!(job.retry_count, 1);
        assert!(job.is_terminal());
        assert!(!job.is_due(Utc::now() + Duration::days(1)));
    }

    #[test]
    fn test_release_claim_keeps_retry_count() {
        let mut job = job();
        job.claim(Utc::now()).unwrap();
        job.release_claim().unwrap();
        assert_eq!(job.state, MailState::Pending);
        assert_eq!(job.retry_count, 0);
        assert!(job.claimed_at.is_none());
    }

    #[test]
    fn test_cancel_only_from_pending() {
        let mut pending = job();
        pending.cancel().unwrap();
        assert_eq!(pending.state, MailState::Cancelled);

        let mut sending = job();
        sending.claim(Utc::now()).unwrap();
        match sending.cancel() {
            Err(ForumError::InvalidState { expected, actual }) => {
                assert_eq!(expected, "pending");
                assert_eq!(actual, "sending");
            }
            other => panic!("Expected invalid state, got {other:?}"),
        }
    }
}
