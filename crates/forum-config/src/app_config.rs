//! Application configuration structures.

use forum_core::TelemetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name and metadata.
    #[serde(default)]
    pub app: AppMetadata,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Outbound SMTP configuration.
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Queue and dispatcher tuning.
    #[serde(default)]
    pub mail_queue: MailQueueConfig,

    /// Logging and metrics.
    #[serde(default)]
    pub observability: TelemetryConfig,
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppMetadata {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Environment (development, staging, production).
    pub environment: String,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "forum-mailer".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

impl AppMetadata {
    /// Checks if running in production.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL. Empty selects the in-memory queue store.
    pub url: String,
    /// Minimum pool size.
    pub min_connections: u32,
    /// Maximum pool size.
    pub max_connections: u32,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds.
    pub idle_timeout_secs: u64,
    /// Run embedded migrations at startup.
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            min_connections: 1,
            max_connections: 10,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
            run_migrations: true,
        }
    }
}

impl DatabaseConfig {
    /// Whether a database URL was supplied.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// Returns the connect timeout as a Duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Returns the idle timeout as a Duration.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmtpTlsMode {
    /// Plain connection. Local relays only.
    None,
    /// Upgrade with STARTTLS (port 587).
    #[default]
    StartTls,
    /// Implicit TLS (port 465).
    Tls,
}

/// Outbound SMTP configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    /// Deliver through SMTP. When false, mails are only logged.
    pub enabled: bool,
    /// Relay host.
    pub host: String,
    /// Relay port.
    pub port: u16,
    /// Login user.
    pub username: Option<String>,
    /// Login password.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// `From` header.
    pub from_address: String,
    /// Connection security.
    pub tls: SmtpTlsMode,
    /// Per-command timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 587,
            username: None,
            password: None,
            from_address: "forum@reqspark.com".to_string(),
            tls: SmtpTlsMode::StartTls,
            timeout_secs: 60,
        }
    }
}

impl SmtpConfig {
    /// Returns the SMTP timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Backoff shape between delivery attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// `base * n`
    #[default]
    Linear,
    /// `base * multiplier^(n-1)`
    Exponential,
}

/// Queue and dispatcher tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailQueueConfig {
    /// Jobs claimed per dispatch pass.
    pub batch_size: u32,
    /// Failed attempts before a job is marked failed.
    pub max_attempts: u32,
    /// Backoff shape.
    pub backoff_strategy: BackoffStrategy,
    /// Base backoff delay in seconds.
    pub backoff_base_secs: u64,
    /// Growth factor for exponential backoff.
    pub backoff_multiplier: f64,
    /// Upper bound on a single transport call, in seconds.
    pub delivery_timeout_secs: u64,
    /// Deliveries in flight at once per dispatcher.
    pub concurrency: usize,
    /// Pause between dispatch passes, in seconds.
    pub poll_interval_secs: u64,
    /// Age after which a `sending` claim is considered abandoned, in seconds.
    pub claim_ttl_secs: u64,
    /// Cron expression (with seconds) for retention cleanup.
    pub cleanup_cron: String,
    /// Failed jobs older than this many days are deleted by cleanup.
    pub cleanup_older_than_days: u32,
}

impl Default for MailQueueConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_attempts: 3,
            backoff_strategy: BackoffStrategy::Linear,
            backoff_base_secs: 300,
            backoff_multiplier: 2.0,
            delivery_timeout_secs: 60,
            concurrency: 4,
            poll_interval_secs: 30,
            claim_ttl_secs: 900,
            cleanup_cron: "0 0 3 * * *".to_string(),
            cleanup_older_than_days: 7,
        }
    }
}

impl MailQueueConfig {
    /// Returns the base backoff as a Duration.
    #[must_use]
    pub const fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }

    /// Returns the delivery timeout as a Duration.
    #[must_use]
    pub const fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    /// Returns the poll interval as a Duration.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Returns the claim TTL as a Duration.
    #[must_use]
    pub const fn claim_ttl(&self) -> Duration {
        Duration::from_secs(self.claim_ttl_secs)
    }
}
