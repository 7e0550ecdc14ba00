//! Bulk mail recipient.

use serde::{Deserialize, Serialize};

/// A forum member eligible for bulk mail.
///
/// The address is kept as stored by the user directory; it is validated when
/// a job is created for it, so one bad row only fails its own job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Forum user id.
    pub user_id: i64,
    /// Address as stored.
    pub email: String,
    /// Name substituted for `{username}`.
    pub display_name: String,
}

impl Recipient {
    /// Creates a new recipient.
    #[must_use]
    pub fn new(user_id: i64, email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            display_name: display_name.into(),
        }
    }
}
