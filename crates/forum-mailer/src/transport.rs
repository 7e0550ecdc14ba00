//! Mail transports.

use crate::error::{MailError, MailResult};
use async_trait::async_trait;
use forum_config::{SmtpConfig, SmtpTlsMode};
use forum_core::{MailJob, MailJobId};
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

/// The message handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub job_id: MailJobId,
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
}

impl From<&MailJob> for OutgoingMail {
    fn from(job: &MailJob) -> Self {
        Self {
            job_id: job.id,
            to: job.recipient.to_string(),
            subject: job.subject.clone(),
            html_body: job.html_body.clone(),
            text_body: job.text_body.clone(),
        }
    }
}

/// Delivers one message. `Ok` means the message was accepted for delivery.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Hand the message off.
    async fn deliver(&self, mail: &OutgoingMail) -> MailResult<()>;

    /// Transport name for logs.
    fn name(&self) -> &'static str;
}

/// SMTP transport backed by lettre.
pub struct SmtpMailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailTransport {
    /// Build a transport from configuration. Does not connect.
    pub fn new(config: &SmtpConfig) -> MailResult<Self> {
        let from: Mailbox = config.from_address.parse()?;

        let tls_parameters = || {
            TlsParameters::new(config.host.clone())
                .map_err(|e| MailError::Configuration(format!("SMTP TLS setup failed: {}", e)))
        };
        let tls = match config.tls {
            SmtpTlsMode::None => Tls::None,
            SmtpTlsMode::StartTls => Tls::Required(tls_parameters()?),
            SmtpTlsMode::Tls => Tls::Wrapper(tls_parameters()?),
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .tls(tls)
            .timeout(Some(config.timeout()));

        if let Some(username) = &config.username {
            let password = config.password.clone().unwrap_or_default();
            builder = builder.credentials(Credentials::new(username.clone(), password));
        }

        info!(
            host = %config.host,
            port = config.port,
            tls = ?config.tls,
            "SMTP transport configured"
        );

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }

    fn build_message(&self, mail: &OutgoingMail) -> MailResult<Message> {
        let to: Mailbox = mail.to.parse()?;
        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.as_str());

        let message = match &mail.text_body {
            Some(text) => builder.multipart(MultiPart::alternative_plain_html(
                text.clone(),
                mail.html_body.clone(),
            ))?,
            None => builder
                .header(ContentType::TEXT_HTML)
                .body(mail.html_body.clone())?,
        };
        Ok(message)
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn deliver(&self, mail: &OutgoingMail) -> MailResult<()> {
        let message = self.build_message(mail)?;
        let response = self.mailer.send(message).await?;
        debug!(
            job_id = %mail.job_id,
            code = %response.code(),
            "SMTP server accepted message"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

/// Logs messages instead of sending them. Used when SMTP is disabled.
#[derive(Debug, Clone, Default)]
pub struct LogMailTransport;

#[async_trait]
impl MailTransport for LogMailTransport {
    async fn deliver(&self, mail: &OutgoingMail) -> MailResult<()> {
        if mail.to.trim().is_empty() {
            return Err(MailError::Validation("empty recipient".to_string()));
        }
        info!(
            job_id = %mail.job_id,
            to = %mail.to,
            subject = %mail.subject,
            "Mail delivery skipped (SMTP disabled)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forum_core::{Email, MailCategory};

    fn outgoing(text: Option<&str>) -> OutgoingMail {
        let job = MailJob::new(
            Email::new("member@example.com").unwrap(),
            "Welcome",
            "<p>Hello</p>",
            MailCategory::Welcome,
        )
        .with_text_body(text.map(str::to_string));
        OutgoingMail::from(&job)
    }

    fn smtp_config() -> SmtpConfig {
        SmtpConfig {
            enabled: true,
            host: "smtp.example.com".to_string(),
            from_address: "Forum <forum@example.com>".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_outgoing_from_job() {
        let mail = outgoing(Some("Hello"));
        assert_eq!(mail.to, "member@example.com");
        assert_eq!(mail.subject, "Welcome");
        assert_eq!(mail.text_body.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_smtp_builds_html_and_alternative_messages() {
        let transport = SmtpMailTransport::new(&smtp_config()).unwrap();

        let html_only = transport.build_message(&outgoing(None)).unwrap();
        let raw = String::from_utf8(html_only.formatted()).unwrap();
        assert!(raw.contains("Content-Type: text/html"));
        assert!(raw.contains("Subject: Welcome"));

        let alternative = transport.build_message(&outgoing(Some("Hello"))).unwrap();
        let raw = String::from_utf8(alternative.formatted()).unwrap();
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
    }

    #[tokio::test]
    async fn test_smtp_rejects_bad_from_address() {
        let config = SmtpConfig {
            from_address: "not an address".to_string(),
            ..smtp_config()
        };
        assert!(matches!(
            SmtpMailTransport::new(&config),
            Err(MailError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_log_transport_accepts() {
        let transport = LogMailTransport;
        tokio_test::assert_ok!(transport.deliver(&outgoing(None)).await);
        assert_eq!(transport.name(), "log");
    }
}
