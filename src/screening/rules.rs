//! Intake rules: decide which inbound emails are not applications at all.
//!
//! Runs before extraction so bounces, auto-replies and our own outbound
//! mail never reach the screener or the tracker:
//! - noreply / mailer-daemon / postmaster senders → skip
//! - out-of-office and delivery-failure subjects → skip
//! - the workflow's own from-address → skip
//! - senders outside a configured allowlist → skip

use regex::Regex;
use tracing::debug;

use crate::channels::email::is_sender_allowed;
use crate::channels::email_types::InboundEmail;

/// Which field a rule matches against.
#[derive(Debug, Clone, Copy)]
pub enum RuleField {
    Sender,
    Subject,
    Body,
}

/// A single skip rule with a compiled regex.
#[derive(Debug, Clone)]
pub struct SkipRule {
    /// Human-readable pattern description.
    pub pattern: String,
    pub regex: Regex,
    pub field: RuleField,
    pub reason: String,
}

/// Why an email was not screened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipReason(pub String);

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pre-screen filter for inbound mail.
pub struct IntakeFilter {
    rules: Vec<SkipRule>,
    own_address: Option<String>,
    allowed_senders: Vec<String>,
}

impl IntakeFilter {
    /// Filter with the built-in automated-mail rules.
    pub fn default_rules() -> Self {
        let builtin: [(&str, &str, RuleField, &str); 4] = [
            (
                "noreply@*",
                r"(?i)^no[\-_.]?reply@",
                RuleField::Sender,
                "noreply sender",
            ),
            (
                "mailer-daemon",
                r"(?i)^(mailer[\-_]?daemon|postmaster)@",
                RuleField::Sender,
                "automated mail system",
            ),
            (
                "auto-reply subject",
                r"(?i)^(automatic reply|auto[\- ]?reply|out of (the )?office)",
                RuleField::Subject,
                "auto-reply",
            ),
            (
                "bounce subject",
                r"(?i)(undeliverable|delivery status notification|mail delivery (failed|subsystem))",
                RuleField::Subject,
                "delivery failure notice",
            ),
        ];

        let rules = builtin
            .into_iter()
            .filter_map(|(pattern, re, field, reason)| {
                Regex::new(re).ok().map(|regex| SkipRule {
                    pattern: pattern.into(),
                    regex,
                    field,
                    reason: reason.into(),
                })
            })
            .collect();

        Self {
            rules,
            own_address: None,
            allowed_senders: Vec::new(),
        }
    }

    /// A filter that lets everything through (for testing).
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            own_address: None,
            allowed_senders: Vec::new(),
        }
    }

    /// Skip mail sent from our own address.
    pub fn with_own_address(mut self, address: &str) -> Self {
        if !address.is_empty() {
            self.own_address = Some(address.to_string());
        }
        self
    }

    /// Only screen senders matching the allowlist. An empty list disables the check.
    pub fn with_allowed_senders(mut self, allowed: Vec<String>) -> Self {
        self.allowed_senders = allowed;
        self
    }

    /// Add a custom skip rule.
    pub fn add_rule(
        &mut self,
        pattern: &str,
        field: RuleField,
        reason: &str,
    ) -> Result<(), regex::Error> {
        self.rules.push(SkipRule {
            pattern: pattern.into(),
            regex: Regex::new(pattern)?,
            field,
            reason: reason.into(),
        });
        Ok(())
    }

    /// Returns `Some(reason)` if the email should not be screened.
    pub fn evaluate(&self, email: &InboundEmail) -> Option<SkipReason> {
        if let Some(own) = &self.own_address
            && email.sender.eq_ignore_ascii_case(own)
        {
            return Some(SkipReason("self-sent email".into()));
        }

        if !self.allowed_senders.is_empty()
            && !is_sender_allowed(&self.allowed_senders, &email.sender)
        {
            return Some(SkipReason("sender not in allowlist".into()));
        }

        for rule in &self.rules {
            let value = match rule.field {
                RuleField::Sender => &email.sender,
                RuleField::Subject => &email.subject,
                RuleField::Body => &email.body,
            };
            if rule.regex.is_match(value) {
                debug!(
                    sender = %email.sender,
                    rule = %rule.pattern,
                    reason = %rule.reason,
                    "Email matched skip rule"
                );
                return Some(SkipReason(rule.reason.clone()));
            }
        }

        None
    }
}
