//! Error types for the candidate screener.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    #[error("Sheet error: {0}")]
    Sheet(#[from] SheetError),

    #[error("Screening error: {0}")]
    Screening(#[from] ScreeningError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inbox (IMAP) and outbox (SMTP) errors.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Failed to connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("IMAP authentication failed for {username}")]
    AuthFailed { username: String },

    #[error("IMAP command {command} failed: {reason}")]
    Imap { command: String, reason: String },

    #[error("Failed to send email to {to}: {reason}")]
    SendFailed { to: String, reason: String },

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Email health check failed: {name}")]
    HealthCheckFailed { name: String },

    #[error("Blocking email task failed: {0}")]
    Task(String),
}

/// Candidate tracker (spreadsheet) errors.
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Sheets API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },
}

/// Keyword screening errors.
#[derive(Debug, thiserror::Error)]
pub enum ScreeningError {
    #[error("Keyword list is empty")]
    NoKeywords,

    #[error("Minimum matches ({minimum}) exceeds keyword count ({available})")]
    MinimumTooHigh { minimum: usize, available: usize },

    #[error("Invalid keyword pattern {keyword:?}: {source}")]
    InvalidPattern {
        keyword: String,
        #[source]
        source: regex::Error,
    },

    #[error("Template error: {0}")]
    Template(String),
}

/// Workflow export errors.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Export file not found: {0}")]
    NotFound(String),

    #[error("Export is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the screener.
pub type Result<T> = std::result::Result<T, Error>;
