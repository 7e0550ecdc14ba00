//! Mail job lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a queued mail job.
///
/// ```text
/// pending ──claim──▶ sending ──ok──▶ sent
///    ▲                  │
///    └──retry/release───┤
///                       └──exhausted──▶ failed
/// pending ──cancel──▶ cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MailState {
    /// Waiting for its `scheduled_at` to pass and a dispatcher to claim it.
    #[default]
    Pending,
    /// Claimed by a dispatcher; a delivery attempt is in flight.
    Sending,
    /// Delivered.
    Sent,
    /// Retries exhausted.
    Failed,
    /// Suppressed by an operator before delivery.
    Cancelled,
}

impl MailState {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal states never transition again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Failed | Self::Cancelled)
    }

    /// All possible states.
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [
            Self::Pending,
            Self::Sending,
            Self::Sent,
            Self::Failed,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for MailState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MailState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown mail state: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!MailState::Pending.is_terminal());
        assert!(!MailState::Sending.is_terminal());
        assert!(MailState::Sent.is_terminal());
        assert!(MailState::Failed.is_terminal());
        assert!(MailState::Cancelled.is_terminal());
    }

    #[test]
    fn test_round_trip_through_str() {
        for state in MailState::all() {
            assert_eq!(state.as_str().parse::<MailState>().unwrap(), state);
        }
        assert!("bounced".parse::<MailState>().is_err());
    }

    #[test]
    fn test_serialization_matches_storage() {
        let json = serde_json::to_string(&MailState::Sending).unwrap();
        assert_eq!(json, "\"sending\"");
    }
}
