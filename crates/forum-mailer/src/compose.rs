//! Ready-made forum mails.

use crate::queue::{BulkMail, NewMailJob};
use crate::template::{escape_html, render, USERNAME_PLACEHOLDER};
use chrono::{SecondsFormat, Utc};
use forum_core::MailCategory;
use serde::{Deserialize, Serialize};

/// Forum name and link used in mail bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailBranding {
    pub forum_name: String,
    pub forum_url: String,
}

impl Default for MailBranding {
    fn default() -> Self {
        Self {
            forum_name: "ReqSpark Forum".to_string(),
            forum_url: "https://forum.reqspark.com".to_string(),
        }
    }
}

const WELCOME_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Welcome</title></head>
<body style="font-family: sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto;">
  <h1 style="color: #28a745;">Welcome to {forum_name}, {username}!</h1>
  <p>Hi <strong>{username}</strong>,</p>
  <p>Your account is verified and you are now part of the community.
     Start a thread, reply to others and follow the announcements.</p>
  <p><a href="{forum_url}" style="display: inline-block; padding: 12px 24px; background: #28a745; color: #fff; text-decoration: none; border-radius: 6px;">Go to the forum</a></p>
  <p style="color: #6c757d; font-size: 13px;">The {forum_name} team</p>
</body>
</html>"#;

const WELCOME_TEXT: &str = "Hi {username},

Welcome to {forum_name}! Your account is verified and you are now part of the community.
Start a thread, reply to others and follow the announcements.

Get started: {forum_url}

The {forum_name} team
";

const ANNOUNCEMENT_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body style="font-family: sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto;">
  <p>Hi <strong>{username}</strong>,</p>
  <h1 style="color: #007bff;">{title}</h1>
  <div style="padding: 16px; background: #f8f9fa; border-radius: 6px;">{content}</div>
  <p style="color: #6c757d; font-size: 13px;">Posted by {created_by}</p>
  <p><a href="{forum_url}">Open {forum_name}</a></p>
</body>
</html>"#;

const ANNOUNCEMENT_TEXT: &str = "Hi {username},

{title}

{content}

Posted by {created_by}
{forum_url}
";

/// Welcome mail for a freshly verified member.
pub fn welcome_mail(
    branding: &MailBranding,
    email: impl Into<String>,
    username: &str,
) -> NewMailJob {
    let escaped_name = escape_html(username);
    let html_vars = [
        ("forum_name", branding.forum_name.as_str()),
        ("forum_url", branding.forum_url.as_str()),
        ("username", escaped_name.as_str()),
    ];
    let text_vars = [
        ("forum_name", branding.forum_name.as_str()),
        ("forum_url", branding.forum_url.as_str()),
        ("username", username),
    ];

    NewMailJob::new(
        email,
        format!("Welcome to {}!", branding.forum_name),
        render(WELCOME_HTML, &html_vars),
        MailCategory::Welcome,
    )
    .text_body(render(WELCOME_TEXT, &text_vars))
    .meta("username", username)
    .meta(
        "welcome_date",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

/// A published announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub announcement_id: i64,
    pub title: String,
    pub content: String,
    pub created_by: String,
}

/// Bulk mail for an announcement. `{username}` is left in place for
/// per-recipient substitution.
pub fn announcement_mail(branding: &MailBranding, announcement: &Announcement) -> BulkMail {
    let title = escape_html(&announcement.title);
    let content = escape_html(&announcement.content).replace('\n', "<br>");
    let created_by = escape_html(&announcement.created_by);

    let shared = [
        ("forum_name", branding.forum_name.as_str()),
        ("forum_url", branding.forum_url.as_str()),
        ("username", USERNAME_PLACEHOLDER),
    ];
    let html_vars = [
        ("title", title.as_str()),
        ("content", content.as_str()),
        ("created_by", created_by.as_str()),
    ];
    let text_vars = [
        ("title", announcement.title.as_str()),
        ("content", announcement.content.as_str()),
        ("created_by", announcement.created_by.as_str()),
    ];

    // Branding is rendered before the user-supplied text so braces in the
    // title or content are not expanded.
    let html = render(&render(ANNOUNCEMENT_HTML, &shared), &html_vars);
    let text = render(&render(ANNOUNCEMENT_TEXT, &shared), &text_vars);

    BulkMail::new(
        format!("New announcement: {}", announcement.title),
        html,
        MailCategory::Announcement,
    )
    .text_body(text)
    .meta("announcement_id", announcement.announcement_id)
    .meta("announcement_title", announcement.title.as_str())
    .meta("created_by_username", announcement.created_by.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forum_core::Recipient;

    fn announcement() -> Announcement {
        Announcement {
            announcement_id: 12,
            title: "Exam week <schedule>".to_string(),
            content: "Line one\nLine two & more".to_string(),
            created_by: "admin".to_string(),
        }
    }

    #[test]
    fn test_welcome_mail() {
        let mail = welcome_mail(&MailBranding::default(), "new@example.com", "elif");
        assert_eq!(mail.recipient, "new@example.com");
        assert_eq!(mail.subject, "Welcome to ReqSpark Forum!");
        assert_eq!(mail.category, MailCategory::Welcome);
        assert!(mail.html_body.contains("Hi <strong>elif</strong>"));
        assert!(mail.html_body.contains("https://forum.reqspark.com"));
        assert!(mail.text_body.as_deref().unwrap().starts_with("Hi elif,"));
        assert_eq!(mail.metadata["username"], "elif");
        assert!(mail.metadata.contains_key("welcome_date"));
        assert!(mail.into_job().is_ok());
    }

    #[test]
    fn test_welcome_escapes_username_in_html() {
        let mail = welcome_mail(&MailBranding::default(), "x@example.com", "<b>x</b>");
        assert!(mail.html_body.contains("&lt;b&gt;x&lt;/b&gt;"));
        assert!(mail.text_body.unwrap().contains("<b>x</b>"));
    }

    #[test]
    fn test_announcement_mail() {
        let mail = announcement_mail(&MailBranding::default(), &announcement());
        assert_eq!(mail.subject, "New announcement: Exam week <schedule>");
        assert_eq!(mail.category, MailCategory::Announcement);
        assert!(mail.html_body.contains("Exam week &lt;schedule&gt;"));
        assert!(mail.html_body.contains("Line one<br>Line two &amp; more"));
        assert!(mail.html_body.contains(USERNAME_PLACEHOLDER));
        assert_eq!(mail.metadata["announcement_id"], 12);
        assert_eq!(mail.metadata["created_by_username"], "admin");
    }

    #[test]
    fn test_announcement_personalized_per_recipient() {
        let mail = announcement_mail(&MailBranding::default(), &announcement());
        let single = mail.personalize(&Recipient::new(5, "deniz@example.com", "deniz"));
        assert!(single.html_body.contains("Hi <strong>deniz</strong>"));
        assert!(single.text_body.as_deref().unwrap().starts_with("Hi deniz,"));
        assert_eq!(single.metadata["user_id"], 5);
        assert_eq!(single.metadata["announcement_title"], "Exam week <schedule>");
    }

    #[test]
    fn test_announcement_escapes_recipient_name() {
        let mail = announcement_mail(&MailBranding::default(), &announcement());
        let recipient = Recipient::new(6, "x@example.com", "<img src=x onerror=alert(1)>");
        let single = mail.personalize(&recipient);
        assert!(!single.html_body.contains("<img"));
        assert!(single.html_body.contains("&lt;img src=x onerror=alert(1)&gt;"));
    }
}
