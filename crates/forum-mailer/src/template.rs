//! Placeholder substitution for bulk mail.
//!
//! Only literal `{name}` tokens are replaced; there are no conditionals,
//! loops or escapes.

/// Placeholder replaced with the recipient's display name.
pub const USERNAME_PLACEHOLDER: &str = "{username}";

/// Replaces every `{key}` in `template` with its value.
#[must_use]
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{}}}", key), value)
    })
}

/// Renders the `{username}` placeholder.
#[must_use]
pub fn personalize(template: &str, username: &str) -> String {
    template.replace(USERNAME_PLACEHOLDER, username)
}

/// Escapes text for inclusion in HTML.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personalize_replaces_all() {
        assert_eq!(
            personalize("Hi {username}, bye {username}", "ayse"),
            "Hi ayse, bye ayse"
        );
    }

    #[test]
    fn test_render_leaves_unknown_tokens() {
        let out = render("{greeting} {username} {other}", &[("greeting", "Hello"), ("username", "kemal")]);
        assert_eq!(out, "Hello kemal {other}");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }
}
