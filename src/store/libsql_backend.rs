//! libSQL tracker: a local stand-in for the hiring spreadsheet.
//!
//! One table row per sheet row, same columns. Supports local file and
//! in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::SheetError;
use crate::screening::candidate::{Candidate, CandidateStatus};
use crate::store::migrations;
use crate::store::traits::{CandidateSheet, SheetRow};

const ROW_COLUMNS: &str = "timestamp, name, email, position, experience, matched_keywords, \
                           match_count, status, email_sent, message_id";

/// Candidate tracker backed by a libSQL database.
///
/// `libsql::Connection` is `Send + Sync`; one connection serves every call.
pub struct LibSqlSheet {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    label: String,
}

impl LibSqlSheet {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, SheetError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                SheetError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SheetError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let sheet = Self::from_database(db, format!("libsql:{}", path.display())).await?;
        info!(path = %path.display(), "Candidate tracker opened");
        Ok(sheet)
    }

    /// In-memory tracker (dry runs and tests).
    pub async fn new_memory() -> Result<Self, SheetError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                SheetError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db, "libsql:memory".into()).await
    }

    async fn from_database(db: LibSqlDatabase, label: String) -> Result<Self, SheetError> {
        let conn = db
            .connect()
            .map_err(|e| SheetError::Connection(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            label,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn row_to_sheet_row(row: &libsql::Row) -> Result<SheetRow, libsql::Error> {
    let matched: String = row.get(5)?;
    let match_count: i64 = row.get(6)?;
    let status: String = row.get(7)?;
    let email_sent: i64 = row.get(8)?;

    Ok(SheetRow {
        timestamp: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        position: row.get(3)?,
        experience: row.get(4)?,
        matched_keywords: matched
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        match_count: usize::try_from(match_count).unwrap_or(0),
        status: CandidateStatus::parse(&status),
        email_sent: email_sent != 0,
        message_id: row.get(9)?,
    })
}

#[async_trait]
impl CandidateSheet for LibSqlSheet {
    fn name(&self) -> &str {
        &self.label
    }

    async fn ensure_headers(&self) -> Result<(), SheetError> {
        // Columns are fixed by the schema.
        Ok(())
    }

    async fn append_candidate(
        &self,
        candidate: &Candidate,
        email_sent: bool,
    ) -> Result<(), SheetError> {
        let row = SheetRow::from_candidate(candidate, email_sent);
        self.conn()
            .execute(
                &format!("INSERT INTO candidates (id, {ROW_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
                params![
                    Uuid::new_v4().to_string(),
                    row.timestamp,
                    row.name,
                    row.email,
                    row.position,
                    row.experience,
                    row.matched_keywords.join(", "),
                    row.match_count as i64,
                    row.status.as_str(),
                    i64::from(row.email_sent),
                    row.message_id,
                ],
            )
            .await
            .map_err(|e| SheetError::Query(format!("append_candidate: {e}")))?;

        debug!(email = %candidate.email, status = %candidate.status, "Candidate row appended");
        Ok(())
    }

    async fn list_rows(&self) -> Result<Vec<SheetRow>, SheetError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {ROW_COLUMNS} FROM candidates ORDER BY rowid"),
                (),
            )
            .await
            .map_err(|e| SheetError::Query(format!("list_rows: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| SheetError::Query(format!("list_rows: {e}")))?
        {
            out.push(
                row_to_sheet_row(&row)
                    .map_err(|e| SheetError::Query(format!("list_rows row parse: {e}")))?,
            );
        }
        Ok(out)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<SheetRow>, SheetError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ROW_COLUMNS} FROM candidates WHERE email = ?1 COLLATE NOCASE ORDER BY rowid LIMIT 1"
                ),
                params![email],
            )
            .await
            .map_err(|e| SheetError::Query(format!("find_by_email: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_sheet_row(&row)
                .map(Some)
                .map_err(|e| SheetError::Query(format!("find_by_email row parse: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(SheetError::Query(format!("find_by_email: {e}"))),
        }
    }

    async fn mark_email_sent(&self, email: &str) -> Result<bool, SheetError> {
        let updated = self
            .conn()
            .execute(
                "UPDATE candidates SET email_sent = 1 WHERE id = (
                    SELECT id FROM candidates
                    WHERE email = ?1 COLLATE NOCASE AND email_sent = 0
                    ORDER BY rowid LIMIT 1
                )",
                params![email],
            )
            .await
            .map_err(|e| SheetError::Query(format!("mark_email_sent: {e}")))?;

        debug!(email, updated, "Email Sent flag updated");
        Ok(updated > 0)
    }

    async fn health_check(&self) -> Result<(), SheetError> {
        self.conn()
            .query("SELECT 1", ())
            .await
            .map_err(|e| SheetError::Connection(format!("health_check: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::store::traits::SheetStats;

    fn candidate(email: &str, status: CandidateStatus) -> Candidate {
        Candidate {
            id: Uuid::new_v4(),
            name: "John Doe".into(),
            email: email.into(),
            subject: "Application for Python Developer Position".into(),
            position: Some("Python Developer".into()),
            experience_years: Some(4),
            experience_level: Some("mid-level".into()),
            resume_text: String::new(),
            matched_keywords: vec!["Python".into(), "GenAI".into(), "Mid-level".into()],
            missing_keywords: vec![],
            status,
            message_id: Some("<m1@example.com>".into()),
            received_at: Utc::now(),
            processed_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn append_and_list() {
        let sheet = LibSqlSheet::new_memory().await.unwrap();
        sheet.ensure_headers().await.unwrap();
        sheet
            .append_candidate(&candidate("a@x.com", CandidateStatus::Matched), true)
            .await
            .unwrap();
        sheet
            .append_candidate(&candidate("b@x.com", CandidateStatus::Rejected), false)
            .await
            .unwrap();

        let rows = sheet.list_rows().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].email, "a@x.com");
        assert_eq!(rows[0].matched_keywords, vec!["Python", "GenAI", "Mid-level"]);
        assert_eq!(rows[0].match_count, 3);
        assert!(rows[0].email_sent);
        assert_eq!(rows[1].status, CandidateStatus::Rejected);
        assert!(!rows[1].email_sent);
    }

    #[tokio::test]
    async fn find_by_email_ignores_case() {
        let sheet = LibSqlSheet::new_memory().await.unwrap();
        sheet
            .append_candidate(&candidate("john.doe@example.com", CandidateStatus::Matched), true)
            .await
            .unwrap();

        let row = sheet.find_by_email("John.Doe@Example.com").await.unwrap();
        assert_eq!(row.map(|r| r.name), Some("John Doe".to_string()));
        assert!(sheet.find_by_email("nobody@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_email_sent_flips_first_unsent_row() {
        let sheet = LibSqlSheet::new_memory().await.unwrap();
        sheet
            .append_candidate(&candidate("a@x.com", CandidateStatus::Matched), false)
            .await
            .unwrap();

        assert!(sheet.mark_email_sent("A@x.com").await.unwrap());
        assert!(sheet.list_rows().await.unwrap()[0].email_sent);
        // Nothing left to flip.
        assert!(!sheet.mark_email_sent("a@x.com").await.unwrap());
        assert!(!sheet.mark_email_sent("missing@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn stats_reflect_rows() {
        let sheet = LibSqlSheet::new_memory().await.unwrap();
        sheet
            .append_candidate(&candidate("a@x.com", CandidateStatus::Matched), true)
            .await
            .unwrap();
        sheet
            .append_candidate(&candidate("b@x.com", CandidateStatus::Rejected), true)
            .await
            .unwrap();
        sheet
            .append_candidate(&candidate("c@x.com", CandidateStatus::Rejected), false)
            .await
            .unwrap();

        assert_eq!(
            sheet.stats().await.unwrap(),
            SheetStats {
                total_candidates: 3,
                matched: 1,
                rejected: 2,
                pending: 0,
                emails_sent: 2,
            }
        );
    }

    #[tokio::test]
    async fn local_file_persists_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("candidates.db");

        {
            let sheet = LibSqlSheet::new_local(&path).await.unwrap();
            sheet
                .append_candidate(&candidate("a@x.com", CandidateStatus::Matched), true)
                .await
                .unwrap();
        }

        let reopened = LibSqlSheet::new_local(&path).await.unwrap();
        assert_eq!(reopened.list_rows().await.unwrap().len(), 1);
        assert!(reopened.health_check().await.is_ok());
        assert!(reopened.name().starts_with("libsql:"));
    }
}
