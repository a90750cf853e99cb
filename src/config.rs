//! Configuration types.
//!
//! Everything is read from environment variables, optionally seeded from a
//! `.env` file in the working directory.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::channels::email::EmailConfig;
use crate::error::ConfigError;

pub const DEFAULT_KEYWORDS: &[&str] = &["Python", "GenAI", "Mid-level"];
pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";

/// Environment lookup used by the `from_lookup` constructors.
///
/// `Settings::from_env` passes `std::env::var`; tests pass a closure over a map.
pub trait Lookup: Fn(&str) -> Option<String> {}
impl<F: Fn(&str) -> Option<String>> Lookup for F {}

/// Full runtime configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub email: EmailConfig,
    pub tracker: TrackerConfig,
    pub screening: ScreeningConfig,
    pub templates: TemplateConfig,
    pub workflow: WorkflowConfig,
    pub logging: LogConfig,
}

/// Which spreadsheet holds the candidate rows.
#[derive(Debug, Clone)]
pub enum TrackerConfig {
    GoogleSheets {
        sheet_id: String,
        worksheet: String,
        access_token: SecretString,
        base_url: String,
    },
    /// Local libSQL file standing in for the spreadsheet.
    Local { db_path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct ScreeningConfig {
    pub required_keywords: Vec<String>,
    /// `0` means every keyword is required.
    pub minimum_keyword_matches: usize,
}

#[derive(Debug, Clone)]
pub struct TemplateConfig {
    pub company_name: String,
    pub hr_contact_name: String,
    pub template_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub check_interval: Duration,
    pub max_emails_per_run: usize,
    pub stats_file: PathBuf,
    /// Screen and record, but never send outbound email.
    pub dry_run: bool,
    /// Failed processing attempts before an email is given up on and marked \Seen.
    pub max_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub file: PathBuf,
}

impl Settings {
    /// Load `.env` (if present) and build settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        let email = EmailConfig::from_lookup(lookup)?;

        let tracker = match non_empty(lookup, "CANDIDATE_TRACKER_SHEET_ID") {
            Some(sheet_id) => {
                let access_token = non_empty(lookup, "GOOGLE_SHEETS_ACCESS_TOKEN").ok_or_else(
                    || ConfigError::MissingRequired {
                        key: "GOOGLE_SHEETS_ACCESS_TOKEN".into(),
                        hint: "CANDIDATE_TRACKER_SHEET_ID is set, so a Sheets access token is needed"
                            .into(),
                    },
                )?;
                TrackerConfig::GoogleSheets {
                    sheet_id,
                    worksheet: string_or(lookup, "CANDIDATE_TRACKER_WORKSHEET", "Candidates"),
                    access_token: SecretString::from(access_token),
                    base_url: string_or(lookup, "GOOGLE_SHEETS_BASE_URL", DEFAULT_SHEETS_BASE_URL),
                }
            }
            None => TrackerConfig::Local {
                db_path: PathBuf::from(string_or(
                    lookup,
                    "TRACKER_DB_PATH",
                    "./data/candidates.db",
                )),
            },
        };

        let required_keywords = match non_empty(lookup, "REQUIRED_KEYWORDS") {
            Some(raw) => split_list(&raw),
            None => DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        };
        if required_keywords.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "REQUIRED_KEYWORDS".into(),
                message: "at least one keyword is required".into(),
            });
        }
        let minimum_keyword_matches: usize = parse_or(lookup, "MINIMUM_KEYWORD_MATCHES", 0)?;
        if minimum_keyword_matches > required_keywords.len() {
            return Err(ConfigError::InvalidValue {
                key: "MINIMUM_KEYWORD_MATCHES".into(),
                message: format!(
                    "{minimum_keyword_matches} exceeds the {} configured keywords",
                    required_keywords.len()
                ),
            });
        }

        let templates = TemplateConfig {
            company_name: string_or(lookup, "COMPANY_NAME", "Our Company"),
            hr_contact_name: string_or(lookup, "HR_CONTACT_NAME", "Hiring Team"),
            template_dir: non_empty(lookup, "TEMPLATE_DIR").map(PathBuf::from),
        };

        let check_interval_secs: u64 = parse_or(lookup, "CHECK_INTERVAL_SECONDS", 300)?;
        if check_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CHECK_INTERVAL_SECONDS".into(),
                message: "must be greater than zero".into(),
            });
        }

        let max_attempts: u32 = parse_or(lookup, "MAX_EMAIL_ATTEMPTS", 3)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MAX_EMAIL_ATTEMPTS".into(),
                message: "must be at least 1".into(),
            });
        }

        let workflow = WorkflowConfig {
            check_interval: Duration::from_secs(check_interval_secs),
            max_emails_per_run: parse_or(lookup, "MAX_EMAILS_PER_RUN", 10)?,
            stats_file: PathBuf::from(string_or(
                lookup,
                "STATS_FILE",
                "./data/workflow_stats.json",
            )),
            dry_run: parse_bool(lookup, "DRY_RUN")?,
            max_attempts,
        };

        let logging = LogConfig {
            level: string_or(lookup, "LOG_LEVEL", "INFO"),
            file: PathBuf::from(string_or(
                lookup,
                "LOG_FILE",
                "logs/candidate_screening.log",
            )),
        };

        Ok(Self {
            email,
            tracker,
            screening: ScreeningConfig {
                required_keywords,
                minimum_keyword_matches,
            },
            templates,
            workflow,
            logging,
        })
    }

    /// Secret-free view of the settings, for startup logging and `status`.
    pub fn summary(&self) -> serde_json::Value {
        let tracker = match &self.tracker {
            TrackerConfig::GoogleSheets {
                sheet_id,
                worksheet,
                ..
            } => serde_json::json!({
                "backend": "google_sheets",
                "sheet_id": sheet_id,
                "worksheet": worksheet,
            }),
            TrackerConfig::Local { db_path } => serde_json::json!({
                "backend": "local",
                "db_path": db_path.display().to_string(),
            }),
        };

        serde_json::json!({
            "imap_host": self.email.imap_host,
            "smtp_host": self.email.smtp_host,
            "username": self.email.username,
            "tracker": tracker,
            "required_keywords": self.screening.required_keywords,
            "minimum_keyword_matches": self.screening.minimum_keyword_matches,
            "check_interval": self.workflow.check_interval.as_secs(),
            "max_emails_per_run": self.workflow.max_emails_per_run,
            "max_email_attempts": self.workflow.max_attempts,
            "dry_run": self.workflow.dry_run,
            "company_name": self.templates.company_name,
        })
    }
}

// ── Lookup helpers ──────────────────────────────────────────────────

pub(crate) fn non_empty(lookup: &impl Lookup, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn string_or(lookup: &impl Lookup, key: &str, default: &str) -> String {
    non_empty(lookup, key).unwrap_or_else(|| default.to_string())
}

pub(crate) fn parse_or<T>(lookup: &impl Lookup, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

pub(crate) fn parse_bool(lookup: &impl Lookup, key: &str) -> Result<bool, ConfigError> {
    match non_empty(lookup, key).map(|v| v.to_lowercase()) {
        None => Ok(false),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {v:?}"),
        }),
    }
}

/// Split a comma-separated list, trimming entries and dropping empties.
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
