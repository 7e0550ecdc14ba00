//! Prometheus metrics for the mail queue.

use forum_core::MailState;
use forum_repository::QueueStats;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Metric names.
pub mod names {
    /// Jobs created.
    pub const MAIL_ENQUEUED_TOTAL: &str = "forum_mail_enqueued_total";
    /// Enqueue attempts rejected by validation.
    pub const MAIL_REJECTED_TOTAL: &str = "forum_mail_rejected_total";
    /// Jobs delivered.
    pub const MAIL_SENT_TOTAL: &str = "forum_mail_sent_total";
    /// Failed attempts that were rescheduled.
    pub const MAIL_RETRIED_TOTAL: &str = "forum_mail_retried_total";
    /// Jobs given up after the last attempt.
    pub const MAIL_FAILED_TOTAL: &str = "forum_mail_failed_total";
    /// Attempts cut off by the delivery timeout.
    pub const MAIL_TIMED_OUT_TOTAL: &str = "forum_mail_timed_out_total";
    /// Attempt outcomes that could not be written because the claim was lost.
    pub const MAIL_CLAIMS_LOST_TOTAL: &str = "forum_mail_claims_lost_total";
    /// Claims returned to pending by stale-claim recovery.
    pub const MAIL_CLAIMS_RELEASED_TOTAL: &str = "forum_mail_claims_released_total";
    /// Failed jobs deleted by cleanup.
    pub const MAIL_CLEANED_TOTAL: &str = "forum_mail_cleaned_total";

    /// Jobs per state.
    pub const MAIL_JOBS: &str = "forum_mail_jobs";
    /// Pending jobs.
    pub const MAIL_PENDING: &str = "forum_mail_pending";

    /// Transport call duration in seconds.
    pub const MAIL_DELIVERY_DURATION_SECONDS: &str = "forum_mail_delivery_duration_seconds";
    /// Dispatch pass duration in seconds.
    pub const MAIL_DISPATCH_DURATION_SECONDS: &str = "forum_mail_dispatch_duration_seconds";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::MAIL_ENQUEUED_TOTAL, "Total number of mail jobs enqueued");
    describe_counter!(
        names::MAIL_REJECTED_TOTAL,
        "Total number of enqueue requests rejected by validation"
    );
    describe_counter!(names::MAIL_SENT_TOTAL, "Total number of mails delivered");
    describe_counter!(
        names::MAIL_RETRIED_TOTAL,
        "Total number of failed attempts rescheduled for retry"
    );
    describe_counter!(
        names::MAIL_FAILED_TOTAL,
        "Total number of mail jobs that exhausted their retries"
    );
    describe_counter!(
        names::MAIL_TIMED_OUT_TOTAL,
        "Total number of delivery attempts that timed out"
    );
    describe_counter!(
        names::MAIL_CLAIMS_LOST_TOTAL,
        "Total number of attempt outcomes dropped because the claim was lost"
    );
    describe_counter!(
        names::MAIL_CLAIMS_RELEASED_TOTAL,
        "Total number of stale claims returned to pending"
    );
    describe_counter!(
        names::MAIL_CLEANED_TOTAL,
        "Total number of failed mail jobs deleted by cleanup"
    );

    describe_gauge!(names::MAIL_JOBS, "Current number of mail jobs per state");
    describe_gauge!(names::MAIL_PENDING, "Current number of pending mail jobs");

    describe_histogram!(
        names::MAIL_DELIVERY_DURATION_SECONDS,
        "Transport call duration in seconds"
    );
    describe_histogram!(
        names::MAIL_DISPATCH_DURATION_SECONDS,
        "Dispatch pass duration in seconds"
    );
}

/// Mail metrics recorder.
#[derive(Clone)]
pub struct MailMetrics;

impl MailMetrics {
    /// Record a job enqueued.
    pub fn enqueued(category: &str) {
        counter!(names::MAIL_ENQUEUED_TOTAL, "category" => category.to_string()).increment(1);
    }

    /// Record an enqueue rejected by validation.
    pub fn rejected(category: &str) {
        counter!(names::MAIL_REJECTED_TOTAL, "category" => category.to_string()).increment(1);
    }

    /// Record a delivered job.
    pub fn sent(category: &str, duration: Duration) {
        counter!(names::MAIL_SENT_TOTAL, "category" => category.to_string()).increment(1);
        histogram!(
            names::MAIL_DELIVERY_DURATION_SECONDS,
            "category" => category.to_string(),
            "outcome" => "sent"
        )
        .record(duration.as_secs_f64());
    }

    /// Record a failed attempt. `gave_up` marks the final one.
    pub fn attempt_failed(category: &str, duration: Duration, gave_up: bool) {
        let name = if gave_up {
            names::MAIL_FAILED_TOTAL
        } else {
            names::MAIL_RETRIED_TOTAL
        };
        counter!(name, "category" => category.to_string()).increment(1);
        histogram!(
            names::MAIL_DELIVERY_DURATION_SECONDS,
            "category" => category.to_string(),
            "outcome" => "failed"
        )
        .record(duration.as_secs_f64());
    }

    /// Record a delivery timeout.
    pub fn timed_out(category: &str) {
        counter!(names::MAIL_TIMED_OUT_TOTAL, "category" => category.to_string()).increment(1);
    }

    /// Record a lost claim.
    pub fn claim_lost() {
        counter!(names::MAIL_CLAIMS_LOST_TOTAL).increment(1);
    }

    /// Record released stale claims.
    pub fn claims_released(count: u64) {
        counter!(names::MAIL_CLAIMS_RELEASED_TOTAL).increment(count);
    }

    /// Record cleanup deletions.
    pub fn cleaned(count: u64) {
        counter!(names::MAIL_CLEANED_TOTAL).increment(count);
    }

    /// Record a dispatch pass.
    pub fn dispatch_pass(duration: Duration) {
        histogram!(names::MAIL_DISPATCH_DURATION_SECONDS).record(duration.as_secs_f64());
    }

    /// Publish queue sizes.
    pub fn update_queue_sizes(stats: &QueueStats) {
        for state in MailState::all() {
            gauge!(names::MAIL_JOBS, "state" => state.as_str()).set(stats.count(state) as f64);
        }
        gauge!(names::MAIL_PENDING).set(stats.count(MailState::Pending) as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        // No recorder installed; registration must still be a no-op.
        register_metrics();
    }

    #[test]
    fn test_mail_metrics() {
        MailMetrics::enqueued("welcome");
        MailMetrics::sent("welcome", Duration::from_millis(120));
        MailMetrics::attempt_failed("announcement", Duration::from_secs(2), false);
        MailMetrics::attempt_failed("announcement", Duration::from_secs(2), true);
        MailMetrics::update_queue_sizes(&QueueStats::zeroed());
    }
}
