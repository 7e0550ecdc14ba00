//! Enqueue API: single mails and personalised bulk fan-out.

use crate::error::{MailError, MailResult};
use crate::metrics::MailMetrics;
use crate::template::{escape_html, personalize};
use chrono::{DateTime, Utc};
use forum_core::validation::{field_errors, rules};
use forum_core::{Email, MailCategory, MailJob, MailMetadata, Recipient};
use forum_repository::{MailQueueStore, RecipientDirectory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::{Validate, ValidationError};

fn category_tag(category: &MailCategory) -> Result<(), ValidationError> {
    rules::valid_category_tag(category.as_str())
}

/// A mail to be queued for one recipient.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewMailJob {
    /// Destination address as supplied by the caller.
    pub recipient: String,

    #[validate(
        length(min = 1, max = 200, message = "Subject must be 1-200 characters"),
        custom(function = "rules::not_blank", message = "Subject must not be blank")
    )]
    pub subject: String,

    #[validate(custom(function = "rules::not_blank", message = "HTML body must not be blank"))]
    pub html_body: String,

    pub text_body: Option<String>,

    #[validate(custom(function = "category_tag", message = "Invalid category tag"))]
    pub category: MailCategory,

    #[serde(default)]
    pub metadata: MailMetadata,

    /// Earliest dispatch time. Defaults to now; past times are clamped.
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NewMailJob {
    /// A mail due immediately, without text body or metadata.
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        html_body: impl Into<String>,
        category: impl Into<MailCategory>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            html_body: html_body.into(),
            text_body: None,
            category: category.into(),
            metadata: MailMetadata::new(),
            scheduled_at: None,
        }
    }

    /// Set the plain-text alternative.
    pub fn text_body(mut self, text_body: impl Into<String>) -> Self {
        self.text_body = Some(text_body.into());
        self
    }

    /// Replace the metadata.
    pub fn metadata(mut self, metadata: MailMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Add one metadata entry.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Defer the first attempt.
    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    /// Validate and turn into a pending job.
    pub fn into_job(self) -> MailResult<MailJob> {
        if let Err(errors) = self.validate() {
            let message = field_errors(&errors)
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(MailError::Validation(message));
        }

        let recipient = Email::new(self.recipient.as_str())
            .map_err(|e| MailError::Validation(format!("recipient: {}", e)))?;

        let text_body = self.text_body.filter(|text| !text.trim().is_empty());
        let mut job = MailJob::new(recipient, self.subject, self.html_body, self.category)
            .with_text_body(text_body)
            .with_metadata(self.metadata);
        if let Some(at) = self.scheduled_at {
            job = job.scheduled_for(at);
        }
        Ok(job)
    }
}

/// A mail template fanned out to many recipients.
///
/// `{username}` in the subject and bodies is replaced with each recipient's
/// display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkMail {
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
    pub category: MailCategory,
    /// Shared metadata; per-recipient keys are merged over it.
    #[serde(default)]
    pub metadata: MailMetadata,
}

impl BulkMail {
    /// Create a bulk mail without text body or metadata.
    pub fn new(
        subject: impl Into<String>,
        html_body: impl Into<String>,
        category: impl Into<MailCategory>,
    ) -> Self {
        Self {
            subject: subject.into(),
            html_body: html_body.into(),
            text_body: None,
            category: category.into(),
            metadata: MailMetadata::new(),
        }
    }

    /// Set the plain-text template.
    pub fn text_body(mut self, text_body: impl Into<String>) -> Self {
        self.text_body = Some(text_body.into());
        self
    }

    /// Add one shared metadata entry.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The single-recipient mail for `recipient`. The name is escaped in
    /// the HTML body only.
    pub fn personalize(&self, recipient: &Recipient) -> NewMailJob {
        let name = recipient.display_name.as_str();

        let mut metadata = self.metadata.clone();
        metadata.insert("user_id".to_string(), recipient.user_id.into());
        metadata.insert("username".to_string(), name.into());

        NewMailJob {
            recipient: recipient.email.clone(),
            subject: personalize(&self.subject, name),
            html_body: personalize(&self.html_body, &escape_html(name)),
            text_body: self.text_body.as_deref().map(|text| personalize(text, name)),
            category: self.category.clone(),
            metadata,
            scheduled_at: None,
        }
    }
}

/// A recipient that could not be queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientError {
    pub email: String,
    pub error: String,
}

/// Outcome of a bulk enqueue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkEnqueueReport {
    pub queued_count: usize,
    pub total_recipients: usize,
    pub per_recipient_errors: Vec<RecipientError>,
}

impl BulkEnqueueReport {
    /// Whether every recipient was queued.
    pub fn is_complete(&self) -> bool {
        self.per_recipient_errors.is_empty()
    }
}

/// Writes new jobs to the queue store. Never waits for delivery.
#[derive(Clone)]
pub struct MailQueue {
    store: Arc<dyn MailQueueStore>,
}

impl MailQueue {
    /// Create a queue over a store.
    pub fn new(store: Arc<dyn MailQueueStore>) -> Self {
        Self { store }
    }

    /// Validate and persist one mail as a pending job.
    #[instrument(skip(self, mail), fields(category = %mail.category))]
    pub async fn enqueue(&self, mail: NewMailJob) -> MailResult<MailJob> {
        let category = mail.category.to_string();
        let job = match mail.into_job() {
            Ok(job) => job,
            Err(e) => {
                MailMetrics::rejected(&category);
                return Err(e);
            }
        };

        let job = self.store.insert(&job).await?;
        MailMetrics::enqueued(&category);
        debug!(
            job_id = %job.id,
            recipient = %job.recipient,
            scheduled_at = %job.scheduled_at,
            "Mail queued"
        );
        Ok(job)
    }

    /// Queue a personalised copy for every recipient.
    ///
    /// A recipient that fails validation or insertion is reported and skipped;
    /// the rest are still queued.
    #[instrument(skip(self, recipients, mail), fields(category = %mail.category, total = recipients.len()))]
    pub async fn enqueue_bulk(
        &self,
        recipients: &[Recipient],
        mail: &BulkMail,
    ) -> MailResult<BulkEnqueueReport> {
        let mut report = BulkEnqueueReport {
            total_recipients: recipients.len(),
            ..Default::default()
        };

        for recipient in recipients {
            match self.enqueue(mail.personalize(recipient)).await {
                Ok(_) => report.queued_count += 1,
                Err(e) => {
                    warn!(
                        recipient = %recipient.email,
                        user_id = recipient.user_id,
                        error = %e,
                        "Failed to queue mail for recipient"
                    );
                    report.per_recipient_errors.push(RecipientError {
                        email: recipient.email.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            queued = report.queued_count,
            total = report.total_recipients,
            errors = report.per_recipient_errors.len(),
            "Bulk mail queued"
        );
        Ok(report)
    }

    /// Queue `mail` for every active user of `directory`.
    pub async fn enqueue_bulk_from(
        &self,
        directory: &dyn RecipientDirectory,
        mail: &BulkMail,
    ) -> MailResult<BulkEnqueueReport> {
        let recipients = directory.active_recipients().await?;
        self.enqueue_bulk(&recipients, mail).await
    }
}
