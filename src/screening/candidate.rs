//! Candidate record and screening outcome types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a candidate stands after screening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Pending,
    Matched,
    Rejected,
}

impl CandidateStatus {
    /// Label written to the tracker's Status column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Matched => "Matched",
            Self::Rejected => "Rejected",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "matched" => Self::Matched,
            "rejected" => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

impl std::fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job applicant extracted from an inbound email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub position: Option<String>,
    pub experience_years: Option<u32>,
    pub experience_level: Option<String>,
    /// Text the keyword screener runs over.
    pub resume_text: String,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    #[serde(default)]
    pub missing_keywords: Vec<String>,
    pub status: CandidateStatus,
    pub message_id: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Candidate {
    /// First word of the name, for greetings.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }

    /// Record a screening outcome on this candidate.
    pub fn apply_screening(&mut self, result: &ScreeningResult) {
        self.matched_keywords = result.matched.clone();
        self.missing_keywords = result.missing.clone();
        self.status = if result.passed {
            CandidateStatus::Matched
        } else {
            CandidateStatus::Rejected
        };
        self.processed_at = Some(Utc::now());
    }

    /// Human-readable experience summary, e.g. "4 years (mid-level)".
    pub fn experience_summary(&self) -> String {
        match (self.experience_years, self.experience_level.as_deref()) {
            (Some(1), Some(level)) => format!("1 year ({level})"),
            (Some(1), None) => "1 year".to_string(),
            (Some(y), Some(level)) => format!("{y} years ({level})"),
            (Some(y), None) => format!("{y} years"),
            (None, Some(level)) => level.to_string(),
            (None, None) => String::new(),
        }
    }
}

/// Outcome of running the keyword screener over a text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningResult {
    /// Matched keywords, in configured order.
    pub matched: Vec<String>,
    /// Keywords not found, in configured order.
    pub missing: Vec<String>,
    pub match_count: usize,
    pub total_keywords: usize,
    pub required_matches: usize,
    /// `match_count / total_keywords`.
    pub score: f32,
    pub passed: bool,
}

impl ScreeningResult {
    /// One-line summary used in logs and the `test` command.
    pub fn summary(&self) -> String {
        let verdict = if self.passed { "MATCH" } else { "NO MATCH" };
        let matched = if self.matched.is_empty() {
            "none".to_string()
        } else {
            self.matched.join(", ")
        };
        format!(
            "{verdict}: {}/{} keywords (need {}), matched: {matched}",
            self.match_count, self.total_keywords, self.required_matches
        )
    }
}
