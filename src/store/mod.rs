//! Candidate tracker: the spreadsheet every screened candidate lands in.

pub mod google_sheets;
pub mod libsql_backend;
pub mod migrations;
pub mod traits;

use std::sync::Arc;

use crate::config::TrackerConfig;
use crate::error::SheetError;

pub use google_sheets::GoogleSheetsSheet;
pub use libsql_backend::LibSqlSheet;
pub use traits::{CandidateSheet, HEADERS, SheetRow, SheetStats};

/// Open the tracker selected by configuration.
pub async fn open_tracker(config: &TrackerConfig) -> Result<Arc<dyn CandidateSheet>, SheetError> {
    match config {
        TrackerConfig::GoogleSheets {
            sheet_id,
            worksheet,
            access_token,
            base_url,
        } => Ok(Arc::new(GoogleSheetsSheet::new(
            base_url,
            sheet_id,
            worksheet,
            access_token.clone(),
        ))),
        TrackerConfig::Local { db_path } => Ok(Arc::new(LibSqlSheet::new_local(db_path).await?)),
    }
}
