//! Typed ID wrappers for domain entities.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use uuid::Uuid;

/// A strongly-typed wrapper for mail job IDs.
///
/// UUID v7 keeps IDs roughly ordered by creation time, which keeps the
/// primary key index append-mostly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MailJobId(pub Uuid);

impl MailJobId {
    /// Creates a new random mail job ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a mail job ID from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses a mail job ID from a string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for MailJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for MailJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MailJobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for MailJobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<MailJobId> for Uuid {
    fn from(id: MailJobId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mail_job_id_creation() {
        let id1 = MailJobId::new();
        let id2 = MailJobId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_mail_job_id_parsing() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id = MailJobId::parse(uuid_str).unwrap();
        assert_eq!(id.to_string(), uuid_str);
        assert_eq!(uuid_str.parse::<MailJobId>().unwrap(), id);
    }

    #[test]
    fn test_mail_job_id_rejects_garbage() {
        assert!(MailJobId::parse("not-a-uuid").is_err());
    }
}
