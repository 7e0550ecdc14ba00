//! Mail category tag.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of mail a job carries.
///
/// The well-known tags get their own variants; anything else is kept verbatim
/// in [`MailCategory::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MailCategory {
    /// Forum-wide announcement fan-out.
    Announcement,
    /// Welcome mail sent after verification.
    Welcome,
    /// Verification code mail.
    Verification,
    /// Password reset link.
    PasswordReset,
    /// Any other tag.
    Other(String),
}

impl MailCategory {
    /// Returns the storage representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Announcement => "announcement",
            Self::Welcome => "welcome",
            Self::Verification => "verification",
            Self::PasswordReset => "password_reset",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for MailCategory {
    fn from(value: String) -> Self {
        match value.as_str() {
            "announcement" => Self::Announcement,
            "welcome" => Self::Welcome,
            "verification" => Self::Verification,
            "password_reset" => Self::PasswordReset,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for MailCategory {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<MailCategory> for String {
    fn from(category: MailCategory) -> Self {
        match category {
            MailCategory::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MailCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
