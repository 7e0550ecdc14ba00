//! Recipient lookup over the forum `users` table.

use crate::{DatabasePoolInterface, RecipientDirectory};
use async_trait::async_trait;
use forum_core::{ForumResult, Recipient};
use shaku::Component;
use sqlx::FromRow;
use std::sync::Arc;
use tracing::debug;

/// Reads bulk mail recipients from the forum's `users` table.
#[derive(Component, Clone)]
#[shaku(interface = RecipientDirectory)]
pub struct MySqlRecipientDirectory {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl MySqlRecipientDirectory {
    /// Creates a new directory over the given pool.
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RecipientRow {
    id: i64,
    email: String,
    username: String,
}

#[async_trait]
impl RecipientDirectory for MySqlRecipientDirectory {
    async fn active_recipients(&self) -> ForumResult<Vec<Recipient>> {
        let rows = sqlx::query_as::<_, RecipientRow>(
            r#"
            SELECT CAST(id AS SIGNED) AS id, email, username
            FROM users
            WHERE is_verified = TRUE AND blocked = FALSE
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.pool.inner())
        .await?;

        debug!(count = rows.len(), "Loaded active recipients");

        Ok(rows
            .into_iter()
            .map(|row| Recipient::new(row.id, row.email, row.username))
            .collect())
    }
}
