//! Candidate extraction: turns an inbound email into a `Candidate`.

use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::channels::email_types::{InboundEmail, strip_quoted_text};
use crate::screening::candidate::{Candidate, CandidateStatus};

static REPLY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*((re|fwd?|aw)\s*:\s*)+").expect("valid regex"));

static SUBJECT_POSITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)application\s+(?:for|to)\s+(?:the\s+|a\s+|an\s+)?(.+?)(?:\s+(?:position|role|job|opening|vacancy))?\s*[.!]*$",
    )
    .expect("valid regex")
});

static BODY_POSITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)appl(?:y|ying)\s+for\s+(?:the\s+|a\s+|an\s+)?([A-Za-z0-9][A-Za-z0-9 +#./-]{1,60}?)\s+(?:position|role|job|opening|vacancy)",
    )
    .expect("valid regex")
});

static EXPERIENCE_YEARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s*\+?\s*(?:years?|yrs?)\b").expect("valid regex")
});

static EXPERIENCE_LEVEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(junior|mid[\s\-_]?level|senior|lead|principal|entry[\s\-_]?level)\b")
        .expect("valid regex")
});

static CLOSING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(best(\s+regards)?|kind\s+regards|warm\s+regards|regards|sincerely(\s+yours)?|yours\s+(sincerely|truly)|thanks|thank\s+you|cheers)\s*,?\s*$",
    )
    .expect("valid regex")
});

/// Extracts candidate fields from application emails.
#[derive(Debug, Default, Clone)]
pub struct CandidateExtractor;

impl CandidateExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Build a pending candidate from an email.
    pub fn extract(&self, email: &InboundEmail) -> Candidate {
        let body = strip_quoted_text(&email.body);

        let mut resume_text = body.clone();
        for attachment in &email.attachments {
            resume_text.push_str(&format!(
                "\n\n[Attachment: {}]\n{}",
                attachment.name, attachment.text
            ));
        }

        Candidate {
            id: Uuid::new_v4(),
            name: candidate_name(email.sender_name.as_deref(), &body, &email.sender),
            email: email.sender.trim().to_lowercase(),
            subject: email.subject.clone(),
            position: position_from_subject(&email.subject).or_else(|| position_from_body(&body)),
            experience_years: experience_years(&resume_text),
            experience_level: experience_level(&resume_text),
            resume_text,
            matched_keywords: Vec::new(),
            missing_keywords: Vec::new(),
            status: CandidateStatus::Pending,
            message_id: email.message_id.clone(),
            received_at: email.received_at,
            processed_at: None,
        }
    }
}

/// Display name → signature after a closing line → address local part.
pub fn candidate_name(display_name: Option<&str>, body: &str, sender: &str) -> String {
    if let Some(name) = display_name.map(str::trim)
        && !name.is_empty()
        && !name.contains('@')
    {
        return name.to_string();
    }

    if let Some(name) = signature_name(body) {
        return name;
    }

    name_from_address(sender)
}

/// The first plausible name line after a closing such as "Best regards,".
pub fn signature_name(body: &str) -> Option<String> {
    let lines: Vec<&str> = body.lines().map(str::trim).collect();
    let closing = lines.iter().rposition(|l| CLOSING_LINE.is_match(l))?;

    lines[closing + 1..]
        .iter()
        .find(|l| !l.is_empty())
        .filter(|l| looks_like_name(l))
        .map(|l| l.to_string())
}

fn looks_like_name(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    (1..=4).contains(&words.len())
        && line.len() <= 40
        && words.iter().all(|w| {
            w.chars()
                .all(|c| c.is_alphabetic() || c == '-' || c == '\'' || c == '.')
        })
}

/// "john.doe_92@x.com" → "John Doe".
pub fn name_from_address(sender: &str) -> String {
    let local = sender.split('@').next().unwrap_or(sender);
    let parts: Vec<String> = local
        .split(['.', '_', '-', '+'])
        .map(|p| p.trim_matches(|c: char| c.is_ascii_digit()))
        .filter(|p| !p.is_empty())
        .map(title_case)
        .collect();

    if parts.is_empty() {
        sender.to_string()
    } else {
        parts.join(" ")
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

pub fn position_from_subject(subject: &str) -> Option<String> {
    let subject = REPLY_PREFIX.replace(subject, "");
    SUBJECT_POSITION
        .captures(&subject)
        .and_then(|c| c.get(1))
        .map(|m| clean_position(m.as_str()))
        .filter(|p| !p.is_empty())
}

fn position_from_body(body: &str) -> Option<String> {
    BODY_POSITION
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| clean_position(m.as_str()))
        .filter(|p| !p.is_empty())
}

fn clean_position(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | '!' | ':' | '-'))
        .trim()
        .to_string()
}

pub fn experience_years(text: &str) -> Option<u32> {
    EXPERIENCE_YEARS
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Normalized seniority, e.g. "mid-level".
pub fn experience_level(text: &str) -> Option<String> {
    EXPERIENCE_LEVEL.captures(text).and_then(|c| c.get(1)).map(|m| {
        m.as_str()
            .to_lowercase()
            .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-")
            .replace("midlevel", "mid-level")
            .replace("entrylevel", "entry-level")
    })
}
