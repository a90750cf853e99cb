//! `CandidateSheet`: the spreadsheet every screened candidate is written to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SheetError;
use crate::screening::candidate::{Candidate, CandidateStatus};

/// Column headers, in sheet order.
pub const HEADERS: [&str; 10] = [
    "Timestamp",
    "Name",
    "Email",
    "Position",
    "Experience",
    "Matched Keywords",
    "Match Count",
    "Status",
    "Email Sent",
    "Message ID",
];

/// Zero-based index of the "Email Sent" column.
pub const EMAIL_SENT_COLUMN: usize = 8;

/// One tracker row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRow {
    pub timestamp: String,
    pub name: String,
    pub email: String,
    pub position: String,
    pub experience: String,
    pub matched_keywords: Vec<String>,
    pub match_count: usize,
    pub status: CandidateStatus,
    pub email_sent: bool,
    pub message_id: String,
}

impl SheetRow {
    pub fn from_candidate(candidate: &Candidate, email_sent: bool) -> Self {
        Self {
            timestamp: candidate
                .processed_at
                .unwrap_or(candidate.received_at)
                .to_rfc3339(),
            name: candidate.name.clone(),
            email: candidate.email.clone(),
            position: candidate.position.clone().unwrap_or_default(),
            experience: candidate.experience_summary(),
            matched_keywords: candidate.matched_keywords.clone(),
            match_count: candidate.matched_keywords.len(),
            status: candidate.status,
            email_sent,
            message_id: candidate.message_id.clone().unwrap_or_default(),
        }
    }

    /// Cell values in `HEADERS` order.
    pub fn to_values(&self) -> Vec<String> {
        vec![
            self.timestamp.clone(),
            self.name.clone(),
            self.email.clone(),
            self.position.clone(),
            self.experience.clone(),
            self.matched_keywords.join(", "),
            self.match_count.to_string(),
            self.status.as_str().to_string(),
            yes_no(self.email_sent).to_string(),
            self.message_id.clone(),
        ]
    }

    /// Parse cell values in `HEADERS` order. Trailing empty cells may be absent.
    pub fn from_values(row: usize, values: &[String]) -> Result<Self, SheetError> {
        let cell = |i: usize| values.get(i).map(|s| s.trim()).unwrap_or("");

        let email = cell(2);
        if email.is_empty() {
            return Err(SheetError::MalformedRow {
                row,
                reason: "missing Email".into(),
            });
        }

        let match_count = match cell(6) {
            "" => 0,
            raw => raw.parse().map_err(|_| SheetError::MalformedRow {
                row,
                reason: format!("Match Count is not a number: {raw:?}"),
            })?,
        };

        Ok(Self {
            timestamp: cell(0).to_string(),
            name: cell(1).to_string(),
            email: email.to_string(),
            position: cell(3).to_string(),
            experience: cell(4).to_string(),
            matched_keywords: cell(5)
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            match_count,
            status: CandidateStatus::parse(cell(7)),
            email_sent: cell(8).eq_ignore_ascii_case("yes"),
            message_id: cell(9).to_string(),
        })
    }
}

pub fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

/// Aggregate counts over the tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetStats {
    pub total_candidates: usize,
    pub matched: usize,
    pub rejected: usize,
    pub pending: usize,
    pub emails_sent: usize,
}

impl SheetStats {
    pub fn from_rows(rows: &[SheetRow]) -> Self {
        rows.iter().fold(Self::default(), |mut stats, row| {
            stats.total_candidates += 1;
            match row.status {
                CandidateStatus::Matched => stats.matched += 1,
                CandidateStatus::Rejected => stats.rejected += 1,
                CandidateStatus::Pending => stats.pending += 1,
            }
            if row.email_sent {
                stats.emails_sent += 1;
            }
            stats
        })
    }
}

/// Backend-agnostic candidate tracker.
#[async_trait]
pub trait CandidateSheet: Send + Sync {
    /// Backend name for logs and connection reports.
    fn name(&self) -> &str;

    /// Write the header row if the sheet does not have one.
    async fn ensure_headers(&self) -> Result<(), SheetError>;

    /// Append one row for a screened candidate.
    async fn append_candidate(
        &self,
        candidate: &Candidate,
        email_sent: bool,
    ) -> Result<(), SheetError>;

    /// All data rows, oldest first.
    async fn list_rows(&self) -> Result<Vec<SheetRow>, SheetError>;

    /// First row for `email` (case-insensitive).
    async fn find_by_email(&self, email: &str) -> Result<Option<SheetRow>, SheetError> {
        Ok(self
            .list_rows()
            .await?
            .into_iter()
            .find(|r| r.email.eq_ignore_ascii_case(email)))
    }

    /// Flip "Email Sent" to Yes for `email`. Returns `false` if no row exists.
    async fn mark_email_sent(&self, email: &str) -> Result<bool, SheetError>;

    async fn stats(&self) -> Result<SheetStats, SheetError> {
        Ok(SheetStats::from_rows(&self.list_rows().await?))
    }

    async fn health_check(&self) -> Result<(), SheetError>;
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn candidate() -> Candidate {
        Candidate {
            id: Uuid::new_v4(),
            name: "John Doe".into(),
            email: "john.doe@example.com".into(),
            subject: "Application".into(),
            position: Some("Python Developer".into()),
            experience_years: Some(4),
            experience_level: Some("mid-level".into()),
            resume_text: String::new(),
            matched_keywords: vec!["Python".into(), "GenAI".into()],
            missing_keywords: vec!["Mid-level".into()],
            status: CandidateStatus::Rejected,
            message_id: Some("<m1@x>".into()),
            received_at: Utc::now(),
            processed_at: None,
        }
    }

    #[test]
    fn row_values_follow_header_order() {
        let row = SheetRow::from_candidate(&candidate(), true);
        let values = row.to_values();
        assert_eq!(values.len(), HEADERS.len());
        assert_eq!(values[1], "John Doe");
        assert_eq!(values[3], "Python Developer");
        assert_eq!(values[4], "4 years (mid-level)");
        assert_eq!(values[5], "Python, GenAI");
        assert_eq!(values[6], "2");
        assert_eq!(values[7], "Rejected");
        assert_eq!(values[EMAIL_SENT_COLUMN], "Yes");
        assert_eq!(values[9], "<m1@x>");
    }

    #[test]
    fn row_parses_back_from_values() {
        let row = SheetRow::from_candidate(&candidate(), false);
        let parsed = SheetRow::from_values(2, &row.to_values()).unwrap();
        assert_eq!(parsed, row);
    }

    #[test]
    fn short_rows_are_padded() {
        let values: Vec<String> = ["2026-01-01", "Ann", "ann@x.com"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let row = SheetRow::from_values(3, &values).unwrap();
        assert_eq!(row.match_count, 0);
        assert!(row.matched_keywords.is_empty());
        assert_eq!(row.status, CandidateStatus::Pending);
        assert!(!row.email_sent);
    }

    #[test]
    fn malformed_rows_are_reported() {
        let no_email = vec!["t".to_string(), "Ann".to_string()];
        assert!(matches!(
            SheetRow::from_values(4, &no_email),
            Err(SheetError::MalformedRow { row: 4, .. })
        ));

        let mut bad_count = SheetRow::from_candidate(&candidate(), false).to_values();
        bad_count[6] = "two".into();
        assert!(SheetRow::from_values(5, &bad_count).is_err());
    }

    #[test]
    fn stats_count_by_status() {
        let mut rows = vec![SheetRow::from_candidate(&candidate(), true)];
        let mut matched = candidate();
        matched.status = CandidateStatus::Matched;
        rows.push(SheetRow::from_candidate(&matched, true));
        rows.push(SheetRow::from_candidate(&matched, false));

        let stats = SheetStats::from_rows(&rows);
        assert_eq!(
            stats,
            SheetStats {
                total_candidates: 3,
                matched: 2,
                rejected: 1,
                pending: 0,
                emails_sent: 2,
            }
        );
    }
}
