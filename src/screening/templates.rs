//! Acceptance / rejection email templates.
//!
//! Templates use `{placeholder}` substitution. Known placeholders:
//! `{name}`, `{first_name}`, `{position}`, `{company}`,
//! `{matched_keywords}`, `{sender_name}`. Anything else is left verbatim.

use std::path::Path;

use tracing::debug;

use crate::channels::email_types::OutgoingEmail;
use crate::config::TemplateConfig;
use crate::error::ScreeningError;
use crate::screening::candidate::{Candidate, CandidateStatus};

const DEFAULT_ACCEPTANCE_SUBJECT: &str = "Your application for {position} at {company}";
const DEFAULT_ACCEPTANCE_BODY: &str = "Dear {first_name},

Thank you for applying for the {position} role at {company}.

We reviewed your application and are pleased to let you know that your \
background is a strong fit for what we are looking for. A member of our team \
will reach out shortly to schedule an initial interview.

Best regards,
{sender_name}
{company}
";

const DEFAULT_REJECTION_SUBJECT: &str = "Your application for {position} at {company}";
const DEFAULT_REJECTION_BODY: &str = "Dear {first_name},

Thank you for your interest in the {position} role at {company} and for the \
time you took to apply.

After careful review we have decided not to move forward with your \
application at this time. We will keep your details on file and may contact \
you about future openings that match your experience.

We wish you the best in your search.

Best regards,
{sender_name}
{company}
";

/// A subject + body pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub subject: String,
    pub body: String,
}

impl Template {
    /// Parse a template file whose first line is `Subject: ...`.
    pub fn parse(content: &str) -> Result<Self, ScreeningError> {
        let (first, rest) = content.split_once('\n').unwrap_or((content, ""));
        let subject = first
            .strip_prefix("Subject:")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ScreeningError::Template("template must start with a 'Subject:' line".into())
            })?;
        Ok(Self {
            subject: subject.to_string(),
            body: rest.trim_start_matches(['\r', '\n']).to_string(),
        })
    }
}

/// Renders candidate replies.
#[derive(Debug, Clone)]
pub struct EmailTemplates {
    company_name: String,
    sender_name: String,
    acceptance: Template,
    rejection: Template,
}

impl EmailTemplates {
    /// Built-in templates.
    pub fn new(company_name: &str, sender_name: &str) -> Self {
        Self {
            company_name: company_name.to_string(),
            sender_name: sender_name.to_string(),
            acceptance: Template {
                subject: DEFAULT_ACCEPTANCE_SUBJECT.into(),
                body: DEFAULT_ACCEPTANCE_BODY.into(),
            },
            rejection: Template {
                subject: DEFAULT_REJECTION_SUBJECT.into(),
                body: DEFAULT_REJECTION_BODY.into(),
            },
        }
    }

    /// Built-in templates, overridden by `acceptance.txt` / `rejection.txt`
    /// in `template_dir` when present.
    pub fn from_config(config: &TemplateConfig) -> Result<Self, ScreeningError> {
        let mut templates = Self::new(&config.company_name, &config.hr_contact_name);
        if let Some(dir) = &config.template_dir {
            if let Some(t) = load_template(&dir.join("acceptance.txt"))? {
                templates.acceptance = t;
            }
            if let Some(t) = load_template(&dir.join("rejection.txt"))? {
                templates.rejection = t;
            }
        }
        Ok(templates)
    }

    pub fn acceptance_template(&self) -> &Template {
        &self.acceptance
    }

    pub fn rejection_template(&self) -> &Template {
        &self.rejection
    }

    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }

    pub fn acceptance(&self, candidate: &Candidate) -> OutgoingEmail {
        self.build(&self.acceptance, candidate)
    }

    pub fn rejection(&self, candidate: &Candidate) -> OutgoingEmail {
        self.build(&self.rejection, candidate)
    }

    /// Acceptance for matched candidates, rejection otherwise.
    pub fn for_candidate(&self, candidate: &Candidate) -> OutgoingEmail {
        match candidate.status {
            CandidateStatus::Matched => self.acceptance(candidate),
            CandidateStatus::Rejected | CandidateStatus::Pending => self.rejection(candidate),
        }
    }

    fn build(&self, template: &Template, candidate: &Candidate) -> OutgoingEmail {
        OutgoingEmail {
            to: candidate.email.clone(),
            to_name: Some(candidate.name.clone()),
            subject: self.render(&template.subject, candidate),
            body: self.render(&template.body, candidate),
        }
    }

    /// Substitute placeholders in `template` for `candidate`.
    pub fn render(&self, template: &str, candidate: &Candidate) -> String {
        let position = candidate.position.as_deref().unwrap_or("open");
        let matched = if candidate.matched_keywords.is_empty() {
            "none".to_string()
        } else {
            candidate.matched_keywords.join(", ")
        };

        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return out;
            };
            let key = &after[..end];
            let value = match key {
                "name" => Some(candidate.name.as_str()),
                "first_name" => Some(candidate.first_name()),
                "position" => Some(position),
                "company" => Some(self.company_name.as_str()),
                "matched_keywords" => Some(matched.as_str()),
                "sender_name" => Some(self.sender_name.as_str()),
                _ => None,
            };
            match value {
                Some(v) => out.push_str(v),
                None => {
                    out.push('{');
                    out.push_str(key);
                    out.push('}');
                }
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }
}

fn load_template(path: &Path) -> Result<Option<Template>, ScreeningError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| ScreeningError::Template(format!("{}: {e}", path.display())))?;
    debug!(path = %path.display(), "Loaded email template");
    Template::parse(&content)
        .map(Some)
        .map_err(|e| ScreeningError::Template(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn candidate(status: CandidateStatus) -> Candidate {
        Candidate {
            id: Uuid::new_v4(),
            name: "John Doe".into(),
            email: "john.doe@example.com".into(),
            subject: "Application for Python Developer Position".into(),
            position: Some("Python Developer".into()),
            experience_years: Some(4),
            experience_level: Some("mid-level".into()),
            resume_text: String::new(),
            matched_keywords: vec!["Python".into(), "GenAI".into()],
            missing_keywords: vec![],
            status,
            message_id: None,
            received_at: Utc::now(),
            processed_at: None,
        }
    }

    #[test]
    fn acceptance_for_matched_candidate() {
        let templates = EmailTemplates::new("Acme", "Acme Hiring");
        let email = templates.for_candidate(&candidate(CandidateStatus::Matched));
        assert_eq!(email.to, "john.doe@example.com");
        assert_eq!(email.to_name.as_deref(), Some("John Doe"));
        assert_eq!(email.subject, "Your application for Python Developer at Acme");
        assert!(email.body.starts_with("Dear John,"));
        assert!(email.body.contains("initial interview"));
        assert!(email.body.contains("Acme Hiring"));
    }

    #[test]
    fn rejection_for_rejected_candidate() {
        let templates = EmailTemplates::new("Acme", "Acme Hiring");
        let email = templates.for_candidate(&candidate(CandidateStatus::Rejected));
        assert!(email.body.contains("not to move forward"));
    }

    #[test]
    fn unknown_placeholders_are_kept() {
        let templates = EmailTemplates::new("Acme", "HR");
        let out = templates.render(
            "{name} / {unknown} / {matched_keywords} / {",
            &candidate(CandidateStatus::Matched),
        );
        assert_eq!(out, "John Doe / {unknown} / Python, GenAI / {");
    }

    #[test]
    fn missing_position_uses_generic_label() {
        let templates = EmailTemplates::new("Acme", "HR");
        let mut c = candidate(CandidateStatus::Matched);
        c.position = None;
        assert_eq!(templates.render("the {position} role", &c), "the open role");
    }

    #[test]
    fn template_parse_requires_subject() {
        let t = Template::parse("Subject: Hi {name}\n\nBody here").unwrap();
        assert_eq!(t.subject, "Hi {name}");
        assert_eq!(t.body, "Body here");
        assert!(Template::parse("No subject line").is_err());
    }

    #[test]
    fn template_dir_overrides_acceptance_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("acceptance.txt"),
            "Subject: Welcome {first_name}\nSee you soon, {name}.",
        )
        .unwrap();

        let config = TemplateConfig {
            company_name: "Acme".into(),
            hr_contact_name: "HR".into(),
            template_dir: Some(dir.path().to_path_buf()),
        };
        let templates = EmailTemplates::from_config(&config).unwrap();

        let accept = templates.acceptance(&candidate(CandidateStatus::Matched));
        assert_eq!(accept.subject, "Welcome John");
        assert_eq!(accept.body, "See you soon, John Doe.");

        let reject = templates.rejection(&candidate(CandidateStatus::Rejected));
        assert!(reject.body.contains("not to move forward"));
    }

    #[test]
    fn broken_template_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rejection.txt"), "no subject").unwrap();
        let config = TemplateConfig {
            company_name: "Acme".into(),
            hr_contact_name: "HR".into(),
            template_dir: Some(dir.path().to_path_buf()),
        };
        assert!(EmailTemplates::from_config(&config).is_err());
    }
}
