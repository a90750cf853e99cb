//! Screening workflow: inbox → screen → tracker → reply.
//!
//! `run_single_cycle()` handles one batch of unseen email:
//! 1. `IntakeFilter` drops bounces, auto-replies and blocked senders
//! 2. senders already in the tracker are counted as duplicates
//! 3. extract, screen, render the acceptance or rejection reply
//! 4. append the tracker row with `Email Sent = No`
//! 5. send the reply (skipped in dry-run mode) and flip `Email Sent`
//! 6. mark the email \Seen
//!
//! A failure on one email is logged and counted; that email stays unseen
//! and is retried on the next cycle. If its row was already written, the
//! retry resumes at the reply instead of treating the sender as a
//! duplicate. After `MAX_EMAIL_ATTEMPTS` failures the email is marked
//! \Seen so it cannot block newer mail.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::channels::email::{EmailClient, Inbox, Outbox};
use crate::channels::email_types::{InboundEmail, OutgoingEmail};
use crate::config::Settings;
use crate::error::Result;
use crate::screening::candidate::{Candidate, CandidateStatus, ScreeningResult};
use crate::screening::{CandidateExtractor, EmailTemplates, IntakeFilter, KeywordScreener};
use crate::store::{self, CandidateSheet, SheetStats};
use crate::workflow::stats::WorkflowStats;

/// What happened to one fetched email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EmailOutcome {
    Skipped {
        uid: String,
        sender: String,
        reason: String,
    },
    Duplicate {
        uid: String,
        email: String,
    },
    Processed {
        uid: String,
        email: String,
        status: CandidateStatus,
        email_sent: bool,
    },
    Failed {
        uid: String,
        error: String,
        attempts: u32,
        /// Attempt cap reached; the email is marked \Seen and not retried.
        abandoned: bool,
    },
}

impl EmailOutcome {
    /// Whether the email is finished with and may be marked \Seen.
    fn is_settled(&self) -> bool {
        !matches!(
            self,
            EmailOutcome::Failed {
                abandoned: false,
                ..
            }
        )
    }

    fn uid(&self) -> &str {
        match self {
            EmailOutcome::Skipped { uid, .. }
            | EmailOutcome::Duplicate { uid, .. }
            | EmailOutcome::Processed { uid, .. }
            | EmailOutcome::Failed { uid, .. } => uid,
        }
    }
}

/// Result of one `run_single_cycle()`.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub fetched: usize,
    /// This cycle's counters only.
    pub stats: WorkflowStats,
    pub outcomes: Vec<EmailOutcome>,
}

/// A hand-written application for `test` mode.
#[derive(Debug, Clone, Serialize)]
pub struct TestEmail {
    pub sender_email: String,
    pub sender_name: Option<String>,
    pub subject: String,
    pub body: String,
}

impl TestEmail {
    /// The built-in sample application.
    pub fn sample() -> Self {
        Self {
            sender_email: "john.doe@example.com".into(),
            sender_name: Some("John Doe".into()),
            subject: "Application for Python Developer Position".into(),
            body: "Dear Hiring Team,\n\n\
                   I am writing to apply for the Python Developer position at your company.\n\
                   I have 4 years of experience as a Mid-level developer working with Python\n\
                   and have recently been exploring GenAI technologies.\n\n\
                   Please find my resume attached.\n\n\
                   Best regards,\n\
                   John Doe\n"
                .into(),
        }
    }

    pub fn into_inbound(self) -> InboundEmail {
        InboundEmail {
            uid: "test".into(),
            message_id: None,
            sender: self.sender_email,
            sender_name: self.sender_name,
            subject: self.subject,
            body: self.body,
            attachments: Vec::new(),
            received_at: Utc::now(),
        }
    }
}

/// Result of `process_test_email()`.
#[derive(Debug, Clone, Serialize)]
pub struct TestOutcome {
    pub candidate: Candidate,
    pub email_response: OutgoingEmail,
    pub screening: ScreeningResult,
    pub screening_summary: String,
}

/// Snapshot for the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStatus {
    pub workflow_stats: WorkflowStats,
    /// `None` when the tracker could not be read.
    pub sheet_stats: Option<SheetStats>,
    pub settings: serde_json::Value,
}

pub struct WorkflowOrchestrator {
    settings: Settings,
    inbox: Arc<dyn Inbox>,
    outbox: Arc<dyn Outbox>,
    sheet: Arc<dyn CandidateSheet>,
    filter: IntakeFilter,
    extractor: CandidateExtractor,
    screener: KeywordScreener,
    templates: EmailTemplates,
    stats: Mutex<WorkflowStats>,
}

impl WorkflowOrchestrator {
    /// Wire up the IMAP/SMTP client and the configured tracker.
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let client = Arc::new(EmailClient::new(settings.email.clone()));
        let sheet = store::open_tracker(&settings.tracker).await?;
        Self::new(settings, client.clone(), client, sheet)
    }

    pub fn new(
        settings: Settings,
        inbox: Arc<dyn Inbox>,
        outbox: Arc<dyn Outbox>,
        sheet: Arc<dyn CandidateSheet>,
    ) -> Result<Self> {
        let screener = KeywordScreener::new(
            &settings.screening.required_keywords,
            settings.screening.minimum_keyword_matches,
        )?;
        let templates = EmailTemplates::from_config(&settings.templates)?;
        let filter = IntakeFilter::default_rules()
            .with_own_address(&settings.email.from_address)
            .with_allowed_senders(settings.email.allowed_senders.clone());
        let stats = WorkflowStats::load(&settings.workflow.stats_file);

        Ok(Self {
            settings,
            inbox,
            outbox,
            sheet,
            filter,
            extractor: CandidateExtractor::new(),
            screener,
            templates,
            stats: Mutex::new(stats),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Check IMAP, SMTP and the tracker. Keys: `imap`, `smtp`, `sheet`.
    pub async fn test_connections(&self) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();

        let imap = self.inbox.health_check().await;
        if let Err(e) = &imap {
            error!(error = %e, "IMAP connection test failed");
        }
        results.insert("imap".to_string(), imap.is_ok());

        let smtp = self.outbox.health_check().await;
        if let Err(e) = &smtp {
            error!(error = %e, "SMTP connection test failed");
        }
        results.insert("smtp".to_string(), smtp.is_ok());

        let sheet = self.sheet.health_check().await;
        if let Err(e) = &sheet {
            error!(tracker = self.sheet.name(), error = %e, "Tracker connection test failed");
        }
        results.insert("sheet".to_string(), sheet.is_ok());

        info!(?results, "Connection tests complete");
        results
    }

    /// Fetch and process one batch of unseen email.
    pub async fn run_single_cycle(&self) -> Result<CycleReport> {
        let mut cycle = WorkflowStats {
            cycles: 1,
            last_run: Some(Utc::now()),
            ..Default::default()
        };

        let emails = match self
            .inbox
            .fetch_unseen(self.settings.workflow.max_emails_per_run)
            .await
        {
            Ok(emails) => emails,
            Err(e) => {
                error!(error = %e, "Failed to fetch unseen email");
                cycle.errors += 1;
                self.record_cycle(&cycle).await;
                return Err(e.into());
            }
        };

        let fetched = emails.len();
        if fetched == 0 {
            debug!("No unseen email");
            self.record_cycle(&cycle).await;
            return Ok(CycleReport {
                fetched,
                stats: cycle,
                outcomes: Vec::new(),
            });
        }

        info!(count = fetched, "Processing unseen email");
        if let Err(e) = self.sheet.ensure_headers().await {
            warn!(error = %e, "Could not verify tracker header row");
        }

        let mut outcomes = Vec::with_capacity(fetched);
        for email in &emails {
            let outcome = match self.process_email(email).await {
                Ok(outcome) => outcome,
                Err(e) => self.failed(email, e.to_string()).await,
            };
            tally(&mut cycle, &outcome);
            outcomes.push(outcome);
        }

        let settled: Vec<String> = outcomes
            .iter()
            .filter(|o| o.is_settled())
            .map(|o| o.uid().to_string())
            .collect();
        if !settled.is_empty() {
            match self.inbox.mark_seen(&settled).await {
                Ok(()) => self.stats.lock().await.clear_failures(&settled),
                Err(e) => warn!(error = %e, "Failed to mark emails as seen"),
            }
        }

        info!(
            processed = cycle.total_processed,
            matched = cycle.matched_candidates,
            rejected = cycle.rejected_candidates,
            sent = cycle.emails_sent,
            skipped = cycle.skipped,
            duplicates = cycle.duplicates,
            errors = cycle.errors,
            "Cycle complete"
        );
        self.record_cycle(&cycle).await;

        Ok(CycleReport {
            fetched,
            stats: cycle,
            outcomes,
        })
    }

    async fn process_email(&self, email: &InboundEmail) -> Result<EmailOutcome> {
        if let Some(reason) = self.filter.evaluate(email) {
            info!(uid = %email.uid, sender = %email.sender, %reason, "Skipping email");
            return Ok(EmailOutcome::Skipped {
                uid: email.uid.clone(),
                sender: email.sender.clone(),
                reason: reason.0,
            });
        }

        let mut candidate = self.extractor.extract(email);

        // A row left with `Email Sent = No` by an earlier attempt on this same
        // message means only the reply is outstanding.
        let resuming = match self.sheet.find_by_email(&candidate.email).await? {
            Some(existing)
                if !existing.email_sent
                    && existing.message_id == candidate.message_id.as_deref().unwrap_or_default() =>
            {
                info!(uid = %email.uid, email = %candidate.email, "Resuming unsent reply");
                true
            }
            Some(existing) => {
                info!(
                    email = %candidate.email,
                    first_seen = %existing.timestamp,
                    "Candidate already in tracker"
                );
                return Ok(EmailOutcome::Duplicate {
                    uid: email.uid.clone(),
                    email: candidate.email,
                });
            }
            None => false,
        };

        let result = self.screener.screen(&candidate.resume_text);
        candidate.apply_screening(&result);
        info!(
            email = %candidate.email,
            name = %candidate.name,
            summary = %result.summary(),
            "Candidate screened"
        );

        if !resuming {
            self.sheet.append_candidate(&candidate, false).await?;
        }

        let reply = self.templates.for_candidate(&candidate);
        let email_sent = if self.settings.workflow.dry_run {
            info!(to = %reply.to, subject = %reply.subject, "Dry run, reply not sent");
            false
        } else {
            self.outbox.send(&reply).await?;
            // The reply is out; a stale flag must not turn into a second send.
            if let Err(e) = self.sheet.mark_email_sent(&candidate.email).await {
                warn!(email = %candidate.email, error = %e, "Reply sent but Email Sent flag not updated");
            }
            true
        };

        Ok(EmailOutcome::Processed {
            uid: email.uid.clone(),
            email: candidate.email,
            status: candidate.status,
            email_sent,
        })
    }

    /// Count a failed attempt and decide whether to give up on the email.
    async fn failed(&self, email: &InboundEmail, error: String) -> EmailOutcome {
        let attempts = self.stats.lock().await.record_failure(&email.uid);
        let abandoned = attempts >= self.settings.workflow.max_attempts;
        if abandoned {
            error!(
                uid = %email.uid,
                sender = %email.sender,
                attempts,
                %error,
                "Giving up on email, marking it seen"
            );
        } else {
            error!(uid = %email.uid, sender = %email.sender, attempts, %error, "Failed to process email");
        }
        EmailOutcome::Failed {
            uid: email.uid.clone(),
            error,
            attempts,
            abandoned,
        }
    }

    async fn record_cycle(&self, cycle: &WorkflowStats) {
        let mut stats = self.stats.lock().await;
        stats.absorb(cycle);
        if let Err(e) = stats.save(&self.settings.workflow.stats_file) {
            warn!(
                path = %self.settings.workflow.stats_file.display(),
                error = %e,
                "Failed to persist workflow stats"
            );
        }
    }

    /// Screen a hand-written email without touching the inbox, tracker or SMTP.
    pub fn process_test_email(&self, email: TestEmail) -> TestOutcome {
        let mut candidate = self.extractor.extract(&email.into_inbound());
        let screening = self.screener.screen(&candidate.resume_text);
        candidate.apply_screening(&screening);
        let email_response = self.templates.for_candidate(&candidate);

        TestOutcome {
            screening_summary: screening.summary(),
            candidate,
            email_response,
            screening,
        }
    }

    /// Run cycles every `CHECK_INTERVAL_SECONDS` until `shutdown` resolves.
    ///
    /// Shutdown is checked between cycles; an in-flight cycle always finishes.
    pub async fn run_continuous<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let interval = self.settings.workflow.check_interval;
        info!(
            interval_secs = interval.as_secs(),
            tracker = self.sheet.name(),
            dry_run = self.settings.workflow.dry_run,
            "Candidate screening started"
        );

        tokio::pin!(shutdown);
        loop {
            if let Err(e) = self.run_single_cycle().await {
                error!(error = %e, "Cycle failed");
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Candidate screening shutting down");
                    return Ok(());
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Lifetime counters, tracker counts and a secret-free settings view.
    pub async fn status(&self) -> WorkflowStatus {
        let workflow_stats = self.stats.lock().await.clone();
        let sheet_stats = match self.sheet.stats().await {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(tracker = self.sheet.name(), error = %e, "Could not read tracker stats");
                None
            }
        };

        WorkflowStatus {
            workflow_stats,
            sheet_stats,
            settings: self.settings.summary(),
        }
    }
}

fn tally(cycle: &mut WorkflowStats, outcome: &EmailOutcome) {
    match outcome {
        EmailOutcome::Skipped { .. } => cycle.skipped += 1,
        EmailOutcome::Duplicate { .. } => cycle.duplicates += 1,
        EmailOutcome::Failed { .. } => cycle.errors += 1,
        EmailOutcome::Processed {
            status, email_sent, ..
        } => {
            cycle.total_processed += 1;
            match status {
                CandidateStatus::Matched => cycle.matched_candidates += 1,
                CandidateStatus::Rejected => cycle.rejected_candidates += 1,
                CandidateStatus::Pending => {}
            }
            if *email_sent {
                cycle.emails_sent += 1;
            }
        }
    }
}
