//! MySQL mail queue store.

use crate::{DatabasePoolInterface, MailJobFilter, MailQueueStore, QueueStats};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use forum_core::{
    Email, ForumError, ForumResult, MailCategory, MailJob, MailJobId, MailMetadata, MailState,
    Page, PageRequest,
};
use shaku::Component;
use sqlx::{types::Json, FromRow, MySql, QueryBuilder};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const COLUMNS: &str = "id, recipient, subject, html_body, text_body, category, metadata, \
                       state, retry_count, last_error, scheduled_at, claimed_at, sent_at, created_at";

/// MySQL-backed queue store.
///
/// Claims use `SELECT ... FOR UPDATE SKIP LOCKED`, so any number of
/// dispatchers can poll the same table.
#[derive(Component, Clone)]
#[shaku(interface = MailQueueStore)]
pub struct MySqlMailQueueStore {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl MySqlMailQueueStore {
    /// Creates a new MySQL mail queue store.
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

/// Database row representation of a mail job.
#[derive(Debug, FromRow)]
struct MailJobRow {
    id: String,
    recipient: String,
    subject: String,
    html_body: String,
    text_body: Option<String>,
    category: String,
    metadata: Option<Json<MailMetadata>>,
    state: String,
    retry_count: u32,
    last_error: Option<String>,
    scheduled_at: DateTime<Utc>,
    claimed_at: Option<DateTime<Utc>>,
    sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MailJobRow> for MailJob {
    type Error = ForumError;

    fn try_from(row: MailJobRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| ForumError::Internal(format!("Invalid UUID in database: {}", e)))?;
        let state = row
            .state
            .parse::<MailState>()
            .map_err(ForumError::Internal)?;

        Ok(MailJob {
            id: MailJobId::from_uuid(id),
            recipient: Email::new_unchecked(row.recipient),
            subject: row.subject,
            html_body: row.html_body,
            text_body: row.text_body,
            category: MailCategory::from(row.category),
            metadata: row.metadata.map(|Json(m)| m).unwrap_or_default(),
            state,
            retry_count: row.retry_count,
            last_error: row.last_error,
            scheduled_at: row.scheduled_at,
            claimed_at: row.claimed_at,
            sent_at: row.sent_at,
            created_at: row.created_at,
        })
    }
}

fn metadata_column(metadata: &MailMetadata) -> Option<Json<&MailMetadata>> {
    (!metadata.is_empty()).then_some(Json(metadata))
}

fn push_filter(builder: &mut QueryBuilder<'_, MySql>, filter: &MailJobFilter) {
    let mut joiner = " WHERE ";
    if let Some(state) = filter.state {
        builder.push(joiner).push("state = ").push_bind(state.as_str());
        joiner = " AND ";
    }
    if let Some(category) = &filter.category {
        builder
            .push(joiner)
            .push("category = ")
            .push_bind(category.as_str().to_string());
    }
}

fn push_id_list(builder: &mut QueryBuilder<'_, MySql>, ids: &[String]) {
    builder.push(" WHERE id IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.clone());
    }
    separated.push_unseparated(")");
}

#[async_trait]
impl MailQueueStore for MySqlMailQueueStore {
    async fn insert(&self, job: &MailJob) -> ForumResult<MailJob> {
        debug!(job_id = %job.id, recipient = %job.recipient, "Inserting mail job");

        sqlx::query(
            r#"
            INSERT INTO mail_queue (id, recipient, subject, html_body, text_body, category,
                                    metadata, state, retry_count, last_error, scheduled_at,
                                    claimed_at, sent_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id.into_inner().to_string())
        .bind(job.recipient.as_str())
        .bind(&job.subject)
        .bind(&job.html_body)
        .bind(&job.text_body)
        .bind(job.category.as_str())
        .bind(metadata_column(&job.metadata))
        .bind(job.state.as_str())
        .bind(job.retry_count)
        .bind(&job.last_error)
        .bind(job.scheduled_at)
        .bind(job.claimed_at)
        .bind(job.sent_at)
        .bind(job.created_at)
        .execute(self.pool.inner())
        .await?;

        Ok(job.clone())
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: u32) -> ForumResult<Vec<MailJob>> {
        // Stored with microsecond precision; the claim marker must compare equal later.
        let now = now.trunc_subsecs(6);
        let mut tx = self.pool.inner().begin().await?;

        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM mail_queue
            WHERE state = 'pending' AND scheduled_at <= ?
            ORDER BY created_at ASC, id ASC
            LIMIT ?
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        if ids.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let mut update =
            QueryBuilder::<MySql>::new("UPDATE mail_queue SET state = 'sending', claimed_at = ");
        update.push_bind(now);
        push_id_list(&mut update, &ids);
        update.build().execute(&mut *tx).await?;

        let mut select = QueryBuilder::<MySql>::new(format!("SELECT {COLUMNS} FROM mail_queue"));
        push_id_list(&mut select, &ids);
        select.push(" ORDER BY created_at ASC, id ASC");
        let rows = select
            .build_query_as::<MailJobRow>()
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(claimed = rows.len(), "Claimed due mail jobs");
        rows.into_iter().map(MailJob::try_from).collect()
    }

    async fn complete_attempt(&self, job: &MailJob, claimed_at: DateTime<Utc>) -> ForumResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE mail_queue
            SET state = ?, retry_count = ?, last_error = ?, scheduled_at = ?,
                claimed_at = NULL, sent_at = ?
            WHERE id = ? AND state = 'sending' AND claimed_at = ?
            "#,
        )
        .bind(job.state.as_str())
        .bind(job.retry_count)
        .bind(&job.last_error)
        .bind(job.scheduled_at)
        .bind(job.sent_at)
        .bind(job.id.into_inner().to_string())
        .bind(claimed_at.trunc_subsecs(6))
        .execute(self.pool.inner())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_by_id(&self, id: MailJobId) -> ForumResult<Option<MailJob>> {
        let row = sqlx::query_as::<_, MailJobRow>(&format!(
            "SELECT {COLUMNS} FROM mail_queue WHERE id = ?"
        ))
        .bind(id.into_inner().to_string())
        .fetch_optional(self.pool.inner())
        .await?;

        row.map(MailJob::try_from).transpose()
    }

    async fn list(&self, filter: &MailJobFilter, page: PageRequest) -> ForumResult<Page<MailJob>> {
        debug!(page = page.page, size = page.size, ?filter, "Listing mail jobs");

        let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM mail_queue");
        push_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(self.pool.inner())
            .await?;

        let mut select = QueryBuilder::<MySql>::new(format!("SELECT {COLUMNS} FROM mail_queue"));
        push_filter(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select
            .build_query_as::<MailJobRow>()
            .fetch_all(self.pool.inner())
            .await?;

        let jobs = rows
            .into_iter()
            .map(MailJob::try_from)
            .collect::<ForumResult<Vec<_>>>()?;

        Ok(Page::new(jobs, page, total.max(0) as u64))
    }

    async fn stats(&self, today_start: DateTime<Utc>) -> ForumResult<QueueStats> {
        let mut stats = QueueStats::zeroed();

        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM mail_queue GROUP BY state")
                .fetch_all(self.pool.inner())
                .await?;
        for (state, count) in rows {
            let state = state.parse::<MailState>().map_err(ForumError::Internal)?;
            let count = count.max(0) as u64;
            stats.by_state.insert(state, count);
            stats.total += count;
        }

        let today: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mail_queue WHERE created_at >= ?")
            .bind(today_start)
            .fetch_one(self.pool.inner())
            .await?;
        stats.today = today.max(0) as u64;

        Ok(stats)
    }

    async fn cancel(&self, id: MailJobId) -> ForumResult<MailJob> {
        let result = sqlx::query(
            "UPDATE mail_queue SET state = 'cancelled' WHERE id = ? AND state = 'pending'",
        )
        .bind(id.into_inner().to_string())
        .execute(self.pool.inner())
        .await?;

        let job = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| ForumError::not_found("MailJob", id))?;

        if result.rows_affected() == 0 {
            return Err(ForumError::invalid_state(MailState::Pending, job.state));
        }

        info!(job_id = %id, "Mail job cancelled");
        Ok(job)
    }

    async fn release_stale_claims(&self, claimed_before: DateTime<Utc>) -> ForumResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE mail_queue
            SET state = 'pending', claimed_at = NULL
            WHERE state = 'sending' AND claimed_at < ?
            "#,
        )
        .bind(claimed_before)
        .execute(self.pool.inner())
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_failed_before(&self, created_before: DateTime<Utc>) -> ForumResult<u64> {
        let result =
            sqlx::query("DELETE FROM mail_queue WHERE state = 'failed' AND created_at < ?")
                .bind(created_before)
                .execute(self.pool.inner())
                .await?;

        Ok(result.rows_affected())
    }
}
