//! Google Sheets tracker: Sheets API v4 `values` endpoints over reqwest.
//!
//! Authenticates with a pre-minted OAuth bearer token. Row 1 holds
//! `HEADERS`; candidates start at row 2.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::SheetError;
use crate::screening::candidate::Candidate;
use crate::store::traits::{CandidateSheet, EMAIL_SENT_COLUMN, HEADERS, SheetRow, yes_no};

const LAST_COLUMN: char = 'J';

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Candidate tracker backed by a Google spreadsheet.
pub struct GoogleSheetsSheet {
    client: reqwest::Client,
    base_url: String,
    sheet_id: String,
    worksheet: String,
    access_token: SecretString,
    label: String,
}

impl GoogleSheetsSheet {
    pub fn new(
        base_url: &str,
        sheet_id: &str,
        worksheet: &str,
        access_token: SecretString,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            sheet_id: sheet_id.to_string(),
            worksheet: worksheet.to_string(),
            access_token,
            label: format!("google_sheets:{sheet_id}/{worksheet}"),
        }
    }

    /// `/v4/spreadsheets/{id}` followed by `segments`.
    fn url(&self, segments: &[&str]) -> Result<Url, SheetError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SheetError::Connection(format!("invalid base URL {}: {e}", self.base_url)))?;
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                SheetError::Connection(format!("base URL cannot hold a path: {}", self.base_url))
            })?;
            path.pop_if_empty()
                .extend(["v4", "spreadsheets", self.sheet_id.as_str()])
                .extend(segments);
        }
        Ok(url)
    }

    fn values_url(&self, range: &str) -> Result<Url, SheetError> {
        self.url(&["values", range])
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(self.access_token.expose_secret())
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, SheetError> {
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SheetError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, SheetError> {
        let url = self.values_url(range)?;
        let resp = self.send(self.request(Method::GET, url)).await?;
        let body: ValueRange = resp.json().await?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn put_values(&self, range: &str, values: Vec<Vec<String>>) -> Result<(), SheetError> {
        let url = self.values_url(range)?;
        let request = self
            .request(Method::PUT, url)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": values,
            }));
        self.send(request).await?;
        Ok(())
    }

    fn range(&self, cells: &str) -> String {
        a1_range(&self.worksheet, cells)
    }
}

/// A1 notation, quoting worksheet names that need it.
pub fn a1_range(worksheet: &str, cells: &str) -> String {
    if worksheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        format!("{worksheet}!{cells}")
    } else {
        format!("'{}'!{cells}", worksheet.replace('\'', "''"))
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn column_letter(index: usize) -> char {
    (b'A' + index as u8) as char
}

#[async_trait]
impl CandidateSheet for GoogleSheetsSheet {
    fn name(&self) -> &str {
        &self.label
    }

    async fn ensure_headers(&self) -> Result<(), SheetError> {
        let header_range = self.range(&format!("A1:{LAST_COLUMN}1"));
        let existing = self.get_values(&header_range).await?;

        match existing.first() {
            Some(row) if row.iter().any(|c| !c.trim().is_empty()) => {
                if row.iter().map(String::as_str).ne(HEADERS) {
                    warn!(found = ?row, "Tracker header row differs from expected columns");
                }
                Ok(())
            }
            _ => {
                let headers = HEADERS.iter().map(|h| h.to_string()).collect();
                self.put_values(&header_range, vec![headers]).await?;
                info!(worksheet = %self.worksheet, "Wrote tracker header row");
                Ok(())
            }
        }
    }

    async fn append_candidate(
        &self,
        candidate: &Candidate,
        email_sent: bool,
    ) -> Result<(), SheetError> {
        let row = SheetRow::from_candidate(candidate, email_sent);
        let range = self.range(&format!("A:{LAST_COLUMN}"));
        let append = format!("{range}:append");
        let url = self.url(&["values", append.as_str()])?;

        let request = self
            .request(Method::POST, url)
            // Cells hold sender-controlled text; RAW keeps `=...` from being evaluated.
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({
                "majorDimension": "ROWS",
                "values": [row.to_values()],
            }));
        self.send(request).await?;

        debug!(email = %candidate.email, status = %candidate.status, "Candidate row appended to sheet");
        Ok(())
    }

    async fn list_rows(&self) -> Result<Vec<SheetRow>, SheetError> {
        let values = self.get_values(&self.range(&format!("A2:{LAST_COLUMN}"))).await?;

        let mut rows = Vec::with_capacity(values.len());
        for (i, cells) in values.iter().enumerate() {
            if cells.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            match SheetRow::from_values(i + 2, cells) {
                Ok(row) => rows.push(row),
                Err(e) => warn!(error = %e, "Skipping malformed tracker row"),
            }
        }
        Ok(rows)
    }

    async fn mark_email_sent(&self, email: &str) -> Result<bool, SheetError> {
        let values = self.get_values(&self.range(&format!("A2:{LAST_COLUMN}"))).await?;

        let position = values.iter().position(|cells| {
            let cell = |i: usize| cells.get(i).map(|s| s.trim()).unwrap_or("");
            cell(2).eq_ignore_ascii_case(email) && !cell(EMAIL_SENT_COLUMN).eq_ignore_ascii_case("yes")
        });
        let Some(index) = position else {
            return Ok(false);
        };

        let sheet_row = index + 2;
        let cell = self.range(&format!("{}{sheet_row}", column_letter(EMAIL_SENT_COLUMN)));
        self.put_values(&cell, vec![vec![yes_no(true).to_string()]])
            .await?;

        debug!(email, sheet_row, "Email Sent flag updated");
        Ok(true)
    }

    async fn health_check(&self) -> Result<(), SheetError> {
        let url = self.url(&[])?;
        self.send(
            self.request(Method::GET, url)
                .query(&[("fields", "spreadsheetId")]),
        )
        .await?;
        Ok(())
    }
}
