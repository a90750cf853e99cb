//! `candidate-screener`: CLI for the candidate screening workflow.
//!
//! - `run`: poll the inbox every `CHECK_INTERVAL_SECONDS` until Ctrl-C.
//! - `single`: process one batch of unseen email.
//! - `test`: screen a sample (or given) application without any I/O.
//! - `status`: lifetime counters, tracker counts and settings.
//! - `export`: write the n8n workflow and tool-neutral spec.
//! - `validate`: grade configuration and exports, write a JSON report.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use candidate_screener::channels::EmailClient;
use candidate_screener::config::Settings;
use candidate_screener::error::ConfigError;
use candidate_screener::export;
use candidate_screener::logging;
use candidate_screener::store::LibSqlSheet;
use candidate_screener::validation::validate_project;
use candidate_screener::workflow::{TestEmail, WorkflowOrchestrator, WorkflowStatus};

/// Automated candidate screening workflow.
#[derive(Parser)]
#[command(name = "candidate-screener", version)]
struct Cli {
    /// Log level (DEBUG, INFO, WARNING, ERROR). Overrides LOG_LEVEL.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the workflow continuously until interrupted.
    Run,

    /// Run a single processing cycle.
    Single,

    /// Screen a test application without touching mail or the tracker.
    Test {
        /// Sender address (defaults to the built-in sample).
        #[arg(long)]
        from: Option<String>,

        /// Subject line.
        #[arg(long)]
        subject: Option<String>,

        /// File containing the email body.
        #[arg(long)]
        body_file: Option<PathBuf>,
    },

    /// Show current workflow status.
    Status,

    /// Write n8n_workflow_export.json and workflow_export.json.
    Export {
        /// Output directory.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Validate configuration and exports.
    Validate {
        /// Directory holding the export files.
        #[arg(long, default_value = ".")]
        export_dir: PathBuf,

        /// Where to write the JSON report.
        #[arg(long, default_value = "validation_report.json")]
        report: PathBuf,

        /// Also check IMAP, SMTP and the tracker connections.
        #[arg(long)]
        live: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let settings = Settings::from_env();
    let (level, log_file) = match &settings {
        Ok(s) => (s.logging.level.clone(), s.logging.file.clone()),
        Err(_) => ("INFO".to_string(), PathBuf::from("logs/candidate_screening.log")),
    };
    let level = cli.log_level.unwrap_or(level);
    let _log_guard = logging::init(&level, &log_file);

    match cli.command {
        Commands::Validate {
            export_dir,
            report,
            live,
        } => return validate(settings.ok(), &export_dir, &report, live).await,
        Commands::Run => {
            let settings = loaded(settings)?;
            let orchestrator = WorkflowOrchestrator::from_settings(settings).await?;
            let connections = orchestrator.test_connections().await;
            if connections.values().any(|ok| !ok) {
                tracing::error!(?connections, "Connection test failed, not starting");
                return Ok(ExitCode::FAILURE);
            }
            orchestrator
                .run_continuous(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                    }
                })
                .await?;
        }
        Commands::Single => {
            let settings = loaded(settings)?;
            let orchestrator = WorkflowOrchestrator::from_settings(settings).await?;
            let report = orchestrator.run_single_cycle().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Test {
            from,
            subject,
            body_file,
        } => {
            let settings = loaded(settings)?;
            let mut email = TestEmail::sample();
            if let Some(from) = from {
                email.sender_email = from;
                email.sender_name = None;
            }
            if let Some(subject) = subject {
                email.subject = subject;
            }
            if let Some(path) = body_file {
                email.body = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
            }

            let client = Arc::new(EmailClient::new(settings.email.clone()));
            let sheet = Arc::new(LibSqlSheet::new_memory().await?);
            let orchestrator = WorkflowOrchestrator::new(settings, client.clone(), client, sheet)?;
            let outcome = orchestrator.process_test_email(email);
            tracing::info!(
                candidate = %outcome.candidate.name,
                email = %outcome.candidate.email,
                status = %outcome.candidate.status,
                "Test candidate screened"
            );
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Status => {
            let settings = loaded(settings)?;
            let orchestrator = WorkflowOrchestrator::from_settings(settings).await?;
            print_status(&orchestrator.status().await);
        }
        Commands::Export { out_dir } => {
            let settings = loaded(settings)?;
            let paths = export::write_exports(&settings, &out_dir)?;
            println!("n8n workflow:  {}", paths.n8n_workflow.display());
            println!("workflow spec: {}", paths.workflow_spec.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Every command except `validate` needs a valid configuration.
fn loaded(settings: Result<Settings, ConfigError>) -> anyhow::Result<Settings> {
    let settings = settings.context("Invalid configuration")?;
    tracing::debug!(settings = %settings.summary(), "Settings loaded");
    Ok(settings)
}

async fn validate(
    settings: Option<Settings>,
    export_dir: &Path,
    report_path: &Path,
    live: bool,
) -> anyhow::Result<ExitCode> {
    let connections = match (live, settings) {
        (true, Some(settings)) => {
            let orchestrator = WorkflowOrchestrator::from_settings(settings).await?;
            Some(orchestrator.test_connections().await)
        }
        _ => None,
    };

    let lookup = |key: &str| std::env::var(key).ok();
    let report = validate_project(&lookup, export_dir, connections.as_ref());
    report.write(report_path)?;

    println!(
        "Passed {}/{} sections ({:.1}%), {} errors, {} warnings",
        report.passed_sections,
        report.total_sections,
        report.success_rate,
        report.errors.len(),
        report.warnings.len()
    );
    for e in &report.errors {
        println!("  FAIL {e}");
    }
    for w in &report.warnings {
        println!("  WARN {w}");
    }
    println!(
        "Status: {}",
        serde_json::to_value(report.overall_status)?
            .as_str()
            .unwrap_or_default()
    );
    println!("Report: {}", report_path.display());

    Ok(if report.overall_status.is_acceptable() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_status(status: &WorkflowStatus) {
    let w = &status.workflow_stats;
    println!("=== Workflow Status ===");
    println!("Total Processed: {}", w.total_processed);
    println!("Matched Candidates: {}", w.matched_candidates);
    println!("Rejected Candidates: {}", w.rejected_candidates);
    println!("Emails Sent: {}", w.emails_sent);
    println!("Skipped: {}", w.skipped);
    println!("Duplicates: {}", w.duplicates);
    println!("Errors: {}", w.errors);
    println!("Cycles: {}", w.cycles);
    match w.last_run {
        Some(at) => println!("Last Run: {}", at.to_rfc3339()),
        None => println!("Last Run: never"),
    }

    println!("\n=== Sheet Statistics ===");
    match &status.sheet_stats {
        Some(s) => {
            println!("Total Candidates: {}", s.total_candidates);
            println!("Matched: {}", s.matched);
            println!("Rejected: {}", s.rejected);
            println!("Pending: {}", s.pending);
            println!("Emails Sent: {}", s.emails_sent);
        }
        None => println!("unavailable"),
    }

    let s = &status.settings;
    println!("\n=== Configuration ===");
    println!("Check Interval: {} seconds", s["check_interval"]);
    println!("Max Emails Per Run: {}", s["max_emails_per_run"]);
    let keywords: Vec<&str> = s["required_keywords"]
        .as_array()
        .map(|a| a.iter().filter_map(|k| k.as_str()).collect())
        .unwrap_or_default();
    println!("Required Keywords: {}", keywords.join(", "));
    println!("Minimum Matches: {}", s["minimum_keyword_matches"]);
    println!("Dry Run: {}", s["dry_run"]);
}
