//! Lifetime workflow counters, persisted as JSON between runs.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowStats {
    pub total_processed: u64,
    pub matched_candidates: u64,
    pub rejected_candidates: u64,
    pub emails_sent: u64,
    pub errors: u64,
    /// Filtered out before extraction (bounces, auto-replies, blocked senders).
    pub skipped: u64,
    /// Senders already present in the tracker.
    pub duplicates: u64,
    pub cycles: u64,
    pub last_run: Option<DateTime<Utc>>,
    /// Failed attempts per IMAP UID for emails still left unseen.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub failed_attempts: BTreeMap<String, u32>,
}

impl WorkflowStats {
    /// Load from `path`. A missing or unreadable file yields zeroed stats.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No stats file, starting fresh");
                return Self::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Stats file unreadable, starting fresh");
            Self::default()
        })
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Fold one cycle's counts into the lifetime totals.
    pub fn absorb(&mut self, cycle: &WorkflowStats) {
        self.total_processed += cycle.total_processed;
        self.matched_candidates += cycle.matched_candidates;
        self.rejected_candidates += cycle.rejected_candidates;
        self.emails_sent += cycle.emails_sent;
        self.errors += cycle.errors;
        self.skipped += cycle.skipped;
        self.duplicates += cycle.duplicates;
        self.cycles += cycle.cycles;
        self.last_run = cycle.last_run.or(self.last_run);
    }

    /// Count one more failed attempt on `uid` and return the total so far.
    pub fn record_failure(&mut self, uid: &str) -> u32 {
        let attempts = self.failed_attempts.entry(uid.to_string()).or_default();
        *attempts += 1;
        *attempts
    }

    /// Forget the failure history of emails that are now settled.
    pub fn clear_failures<S: AsRef<str>>(&mut self, uids: &[S]) {
        for uid in uids {
            self.failed_attempts.remove(uid.as_ref());
        }
    }
}
