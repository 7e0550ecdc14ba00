//! # Forum Mailer
//!
//! Outbound mail delivery for the forum: a durable, at-least-once queue with
//! bounded retries.
//!
//! - [`MailQueue`]: enqueue single mails and personalised bulk fan-out.
//! - [`Dispatcher`]: claims due jobs and delivers them through a
//!   [`MailTransport`], applying the [`RetryPolicy`].
//! - [`MailQueueMaintenance`]: stats, listing, cancellation and cleanup.
//! - [`MaintenanceScheduler`]: periodic cleanup and stale-claim recovery.

pub mod compose;
pub mod dispatcher;
pub mod error;
pub mod maintenance;
pub mod metrics;
pub mod queue;
pub mod retry;
pub mod scheduler;
pub mod template;
pub mod transport;

pub use compose::{announcement_mail, welcome_mail, Announcement, MailBranding};
pub use dispatcher::{DispatchReport, Dispatcher, DispatcherOptions};
pub use error::{MailError, MailResult};
pub use maintenance::{CleanupReport, MailQueueMaintenance};
pub use queue::{BulkEnqueueReport, BulkMail, MailQueue, NewMailJob, RecipientError};
pub use retry::{RetryPolicy, MAX_RETRY_DELAY};
pub use scheduler::MaintenanceScheduler;
pub use transport::{LogMailTransport, MailTransport, OutgoingMail, SmtpMailTransport};

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::dispatcher::{DispatchReport, Dispatcher};
    pub use crate::error::{MailError, MailResult};
    pub use crate::queue::{BulkMail, MailQueue, NewMailJob};
    pub use crate::retry::RetryPolicy;
    pub use crate::transport::{MailTransport, OutgoingMail};
    pub use forum_core::{MailCategory, MailJob, MailState};
}
