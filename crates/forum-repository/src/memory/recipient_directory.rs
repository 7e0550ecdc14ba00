//! Fixed recipient list.

use crate::RecipientDirectory;
use async_trait::async_trait;
use forum_core::{ForumResult, Recipient};

/// Directory over a fixed list of recipients.
#[derive(Debug, Clone, Default)]
pub struct StaticRecipientDirectory {
    recipients: Vec<Recipient>,
}

impl StaticRecipientDirectory {
    /// Creates a directory returning `recipients`.
    #[must_use]
    pub fn new(recipients: Vec<Recipient>) -> Self {
        Self { recipients }
    }
}

#[async_trait]
impl RecipientDirectory for StaticRecipientDirectory {
    async fn active_recipients(&self) -> ForumResult<Vec<Recipient>> {
        Ok(self.recipients.clone())
    }
}
