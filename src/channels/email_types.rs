//! Email-specific types: inbound/outgoing messages, quote stripping, MIME decoding.

use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, MimeHeaders};
use serde::{Deserialize, Serialize};

use crate::channels::email::strip_html;

/// A readable (text/*) attachment pulled out of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextAttachment {
    pub name: String,
    pub text: String,
}

/// An unseen message fetched from the inbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEmail {
    /// IMAP UID, used to mark the message \Seen after processing.
    pub uid: String,
    /// Message-ID header, if the sender set one.
    pub message_id: Option<String>,
    /// Sender address.
    pub sender: String,
    /// Sender display name from the From header.
    pub sender_name: Option<String>,
    pub subject: String,
    /// Plain-text body (HTML is stripped when no text part exists).
    pub body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<TextAttachment>,
    pub received_at: DateTime<Utc>,
}

impl InboundEmail {
    /// Decode a raw RFC 822 message.
    ///
    /// Returns `None` if it cannot be parsed or has no From address to reply to.
    pub fn from_raw(uid: &str, raw: &[u8]) -> Option<Self> {
        let parsed = MessageParser::default().parse(raw)?;

        let from = parsed.from().and_then(|addr| addr.first());
        let sender = from.and_then(|a| a.address())?.to_string();
        let sender_name = from
            .and_then(|a| a.name())
            .map(|s| s.trim().trim_matches('"').to_string())
            .filter(|s| !s.is_empty());

        // mail-parser converts HTML-only bodies to text here.
        let body = parsed
            .body_text(0)
            .map(|text| text.to_string())
            .unwrap_or_default();

        let mut attachments = Vec::new();
        for part in parsed.attachments() {
            let part: &mail_parser::MessagePart = part;
            if let Some(ct) = MimeHeaders::content_type(part)
                && ct.ctype() == "text"
                && let Ok(text) = std::str::from_utf8(part.contents())
            {
                let name = MimeHeaders::attachment_name(part).unwrap_or("file");
                let text = if ct.subtype() == Some("html") {
                    strip_html(text)
                } else {
                    text.to_string()
                };
                attachments.push(TextAttachment {
                    name: name.to_string(),
                    text,
                });
            }
        }

        let received_at = parsed
            .date()
            .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
            .unwrap_or_else(Utc::now);

        Some(Self {
            uid: uid.to_string(),
            message_id: parsed.message_id().map(|s| s.to_string()),
            sender,
            sender_name,
            subject: parsed.subject().unwrap_or("(no subject)").to_string(),
            body,
            attachments,
            received_at,
        })
    }
}

/// A rendered message ready for the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_name: Option<String>,
    pub subject: String,
    pub body: String,
}

/// Strip quoted text from an email body.
///
/// Removes:
/// - Lines starting with `>` (quoted reply lines)
/// - Everything after an "On ... wrote:" attribution line
/// - Everything after a "--- Original Message ---" separator
pub fn strip_quoted_text(body: &str) -> String {
    let mut result = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with('>') {
            continue;
        }

        if trimmed.starts_with("On ") && trimmed.ends_with("wrote:") {
            break;
        }

        if trimmed.starts_with("---") && trimmed.contains("Original Message") {
            break;
        }

        result.push(line);
    }

    while result.last().is_some_and(|l| l.trim().is_empty()) {
        result.pop();
    }

    result.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = concat!(
        "From: \"Jane Smith\" <jane.smith@example.com>\r\n",
        "To: jobs@company.com\r\n",
        "Subject: Application for Python Developer position\r\n",
        "Message-ID: <abc123@example.com>\r\n",
        "Date: Mon, 2 Feb 2026 10:00:00 +0000\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "\r\n",
        "Hello,\r\n",
        "I have 5 years of Python experience.\r\n",
    );

    const WITH_ATTACHMENT: &str = concat!(
        "From: bob@example.com\r\n",
        "Subject: Resume\r\n",
        "MIME-Version: 1.0\r\n",
        "Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n",
        "\r\n",
        "--XYZ\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "Please see attached.\r\n",
        "--XYZ\r\n",
        "Content-Type: text/plain; name=\"resume.txt\"\r\n",
        "Content-Disposition: attachment; filename=\"resume.txt\"\r\n",
        "\r\n",
        "Skills: Rust, GenAI\r\n",
        "--XYZ--\r\n",
    );

    const HTML_ONLY: &str = concat!(
        "From: Ana Lima <ana@example.com>\r\n",
        "Subject: Application for Data Engineer\r\n",
        "MIME-Version: 1.0\r\n",
        "Content-Type: text/html; charset=utf-8\r\n",
        "\r\n",
        "<html><body><p>I have <b>6 years</b> of Python.</p></body></html>\r\n",
    );

    const HTML_ATTACHMENT: &str = concat!(
        "From: carl@example.com\r\n",
        "Subject: CV\r\n",
        "MIME-Version: 1.0\r\n",
        "Content-Type: multipart/mixed; boundary=\"B1\"\r\n",
        "\r\n",
        "--B1\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "CV attached.\r\n",
        "--B1\r\n",
        "Content-Type: text/html; name=\"cv.html\"\r\n",
        "Content-Disposition: attachment; filename=\"cv.html\"\r\n",
        "\r\n",
        "<ul><li>Rust</li><li>GenAI</li></ul>\r\n",
        "--B1--\r\n",
    );

    const NO_FROM: &str = concat!(
        "To: jobs@company.com\r\n",
        "Subject: Application\r\n",
        "\r\n",
        "Hello\r\n",
    );

    // ── from_raw tests ──────────────────────────────────────────

    #[test]
    fn parses_plain_message() {
        let email = InboundEmail::from_raw("7", PLAIN.as_bytes()).unwrap();
        assert_eq!(email.uid, "7");
        assert_eq!(email.sender, "jane.smith@example.com");
        assert_eq!(email.sender_name.as_deref(), Some("Jane Smith"));
        assert_eq!(email.subject, "Application for Python Developer position");
        assert!(email.message_id.as_deref().is_some_and(|id| id.contains("abc123@example.com")));
        assert!(email.body.contains("5 years of Python"));
        assert!(email.attachments.is_empty());
        assert_eq!(email.received_at.to_rfc3339(), "2026-02-02T10:00:00+00:00");
    }

    #[test]
    fn collects_text_attachments() {
        let email = InboundEmail::from_raw("8", WITH_ATTACHMENT.as_bytes()).unwrap();
        assert_eq!(email.sender, "bob@example.com");
        assert!(email.sender_name.is_none());
        assert!(email.body.contains("Please see attached."));
        assert_eq!(email.attachments.len(), 1);
        assert_eq!(email.attachments[0].name, "resume.txt");
        assert!(email.attachments[0].text.contains("Rust, GenAI"));
    }

    #[test]
    fn html_only_body_becomes_text() {
        let email = InboundEmail::from_raw("9", HTML_ONLY.as_bytes()).unwrap();
        assert_eq!(email.sender_name.as_deref(), Some("Ana Lima"));
        assert!(email.body.contains("6 years"));
        assert!(email.body.contains("Python"));
        assert!(!email.body.contains('<'));
    }

    #[test]
    fn html_attachments_are_stripped() {
        let email = InboundEmail::from_raw("10", HTML_ATTACHMENT.as_bytes()).unwrap();
        assert_eq!(email.attachments.len(), 1);
        assert_eq!(email.attachments[0].name, "cv.html");
        let text = &email.attachments[0].text;
        assert!(text.contains("Rust") && text.contains("GenAI"));
        assert!(!text.contains("<li>"));
    }

    #[test]
    fn message_without_sender_is_rejected() {
        assert!(InboundEmail::from_raw("11", NO_FROM.as_bytes()).is_none());
    }

    // ── strip_quoted_text tests ─────────────────────────────────

    #[test]
    fn strip_basic_quoted_lines() {
        let body = "Hello!\n\n> This is quoted\n> Another quoted line\nThanks";
        assert_eq!(strip_quoted_text(body), "Hello!\n\nThanks");
    }

    #[test]
    fn strip_on_wrote_attribution() {
        let body = "Sounds good!\n\nOn Mon, Jan 1, 2026 at 10:00 AM Alice <alice@ex.com> wrote:\n> Original message";
        assert_eq!(strip_quoted_text(body), "Sounds good!");
    }

    #[test]
    fn strip_original_message_separator() {
        let body = "My reply\n\n--- Original Message ---\nOld stuff here";
        assert_eq!(strip_quoted_text(body), "My reply");
    }

    #[test]
    fn strip_no_quotes() {
        let body = "Just a normal message\nWith multiple lines";
        assert_eq!(strip_quoted_text(body), body);
    }

    #[test]
    fn strip_empty_input() {
        assert_eq!(strip_quoted_text(""), "");
    }

    #[test]
    fn outgoing_email_omits_missing_name() {
        let email = OutgoingEmail {
            to: "a@b.com".into(),
            to_name: None,
            subject: "Hi".into(),
            body: "Body".into(),
        };
        let json = serde_json::to_string(&email).unwrap();
        assert!(!json.contains("to_name"));
    }
}
