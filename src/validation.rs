//! Project validation report.
//!
//! Runs a fixed set of sections (credentials, settings, screening,
//! templates, exports, optional live connections). Each section records
//! `Pass` / `Fail` / `Warn` checks and passes when none of its checks
//! fail. The overall grade comes from the share of passing sections and
//! the number of failed checks.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{Lookup, Settings, non_empty};
use crate::error::ExportError;
use crate::export::validate::{missing_spec_keys, read_json, validate_export};
use crate::export::{N8N_EXPORT_FILE, SPEC_EXPORT_FILE, write_json};
use crate::screening::{CandidateExtractor, EmailTemplates, KeywordScreener};
use crate::workflow::TestEmail;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Fail,
    Warn,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub section: String,
    pub test: String,
    pub status: CheckStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Excellent,
    Good,
    NeedsImprovement,
    CriticalIssues,
}

impl OverallStatus {
    /// Grade from the section pass rate (percent) and failed-check count.
    pub fn grade(success_rate: f64, failures: usize) -> Self {
        if success_rate >= 90.0 && failures == 0 {
            Self::Excellent
        } else if success_rate >= 80.0 && failures <= 2 {
            Self::Good
        } else if success_rate >= 60.0 {
            Self::NeedsImprovement
        } else {
            Self::CriticalIssues
        }
    }

    /// Whether the CLI should exit successfully.
    pub fn is_acceptable(self) -> bool {
        matches!(self, Self::Excellent | Self::Good)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub validation_timestamp: DateTime<Utc>,
    pub overall_status: OverallStatus,
    pub success_rate: f64,
    pub passed_sections: usize,
    pub total_sections: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub detailed_results: Vec<CheckResult>,
}

impl ValidationReport {
    pub fn write(&self, path: &Path) -> Result<(), ExportError> {
        write_json(path, self)
    }
}

struct Validator {
    section: String,
    results: Vec<CheckResult>,
    sections: Vec<bool>,
}

impl Validator {
    fn new() -> Self {
        Self {
            section: String::new(),
            results: Vec::new(),
            sections: Vec::new(),
        }
    }

    fn section(&mut self, name: &str, run: impl FnOnce(&mut Self)) {
        self.section = name.to_string();
        let before = self.results.len();
        run(self);
        let passed = self.results[before..]
            .iter()
            .all(|r| r.status != CheckStatus::Fail);
        self.sections.push(passed);
    }

    fn record(&mut self, test: &str, status: CheckStatus, message: impl Into<String>) {
        let message = message.into();
        match status {
            CheckStatus::Pass => info!(section = %self.section, test, %message, "PASS"),
            CheckStatus::Warn => warn!(section = %self.section, test, %message, "WARN"),
            CheckStatus::Fail => error!(section = %self.section, test, %message, "FAIL"),
        }
        self.results.push(CheckResult {
            section: self.section.clone(),
            test: test.to_string(),
            status,
            message,
            timestamp: Utc::now(),
        });
    }

    fn finish(self) -> ValidationReport {
        let total_sections = self.sections.len();
        let passed_sections = self.sections.iter().filter(|p| **p).count();
        let success_rate = if total_sections == 0 {
            0.0
        } else {
            passed_sections as f64 / total_sections as f64 * 100.0
        };

        let collect = |status: CheckStatus| -> Vec<String> {
            self.results
                .iter()
                .filter(|r| r.status == status)
                .map(|r| format!("{}: {}", r.test, r.message))
                .collect()
        };
        let errors = collect(CheckStatus::Fail);
        let warnings = collect(CheckStatus::Warn);

        ValidationReport {
            validation_timestamp: Utc::now(),
            overall_status: OverallStatus::grade(success_rate, errors.len()),
            success_rate,
            passed_sections,
            total_sections,
            errors,
            warnings,
            detailed_results: self.results,
        }
    }
}

/// Validate configuration and exports.
///
/// `export_dir` is where `n8n_workflow_export.json` and
/// `workflow_export.json` are expected. `connections` holds live
/// connection results when they were checked.
pub fn validate_project(
    lookup: &impl Lookup,
    export_dir: &Path,
    connections: Option<&BTreeMap<String, bool>>,
) -> ValidationReport {
    let mut v = Validator::new();

    v.section("Credentials", |v| {
        for key in ["EMAIL_USERNAME", "EMAIL_PASSWORD"] {
            match non_empty(lookup, key) {
                Some(_) => v.record(key, CheckStatus::Pass, "set"),
                None => v.record(key, CheckStatus::Fail, "not set"),
            }
        }
        match non_empty(lookup, "CANDIDATE_TRACKER_SHEET_ID") {
            Some(_) => v.record("CANDIDATE_TRACKER_SHEET_ID", CheckStatus::Pass, "set"),
            None => v.record(
                "CANDIDATE_TRACKER_SHEET_ID",
                CheckStatus::Warn,
                "not set, candidates go to the local tracker",
            ),
        }
    });

    let settings = match Settings::from_lookup(lookup) {
        Ok(s) => Some(s),
        Err(e) => {
            v.section("Settings", |v| v.record("load", CheckStatus::Fail, e.to_string()));
            None
        }
    };
    if let Some(settings) = &settings {
        v.section("Settings", |v| v.record("load", CheckStatus::Pass, "settings parsed"));
        v.section("Screening", |v| check_screening(v, settings));
        v.section("Templates", |v| check_templates(v, settings));
    }

    v.section("n8n Export", |v| check_n8n_export(v, &export_dir.join(N8N_EXPORT_FILE)));
    v.section("Workflow Spec", |v| check_spec(v, &export_dir.join(SPEC_EXPORT_FILE)));

    if let Some(connections) = connections {
        v.section("Connections", |v| {
            for (name, ok) in connections {
                if *ok {
                    v.record(name, CheckStatus::Pass, "connected");
                } else {
                    v.record(name, CheckStatus::Fail, "connection failed");
                }
            }
        });
    }

    v.finish()
}

fn check_screening(v: &mut Validator, settings: &Settings) {
    let screener = match KeywordScreener::new(
        &settings.screening.required_keywords,
        settings.screening.minimum_keyword_matches,
    ) {
        Ok(s) => s,
        Err(e) => {
            v.record("keywords", CheckStatus::Fail, e.to_string());
            return;
        }
    };
    v.record(
        "keywords",
        CheckStatus::Pass,
        format!(
            "{} keywords, {} required",
            screener.keywords().len(),
            screener.required_matches()
        ),
    );

    let candidate = CandidateExtractor::new().extract(&TestEmail::sample().into_inbound());
    let first = screener.screen(&candidate.resume_text);
    let second = screener.screen(&candidate.resume_text);
    if first == second {
        v.record("deterministic", CheckStatus::Pass, first.summary());
    } else {
        v.record(
            "deterministic",
            CheckStatus::Fail,
            "repeated screening gave different results",
        );
    }
}

fn check_templates(v: &mut Validator, settings: &Settings) {
    let templates = match EmailTemplates::from_config(&settings.templates) {
        Ok(t) => t,
        Err(e) => {
            v.record("load", CheckStatus::Fail, e.to_string());
            return;
        }
    };
    v.record("load", CheckStatus::Pass, "templates loaded");

    let candidate = CandidateExtractor::new().extract(&TestEmail::sample().into_inbound());
    for (name, email) in [
        ("acceptance", templates.acceptance(&candidate)),
        ("rejection", templates.rejection(&candidate)),
    ] {
        let leftover = email.subject.contains('{') || email.body.contains('{');
        if email.subject.trim().is_empty() || email.body.trim().is_empty() {
            v.record(name, CheckStatus::Fail, "rendered empty subject or body");
        } else if leftover {
            v.record(name, CheckStatus::Warn, "unrecognised placeholder left in output");
        } else {
            v.record(name, CheckStatus::Pass, email.subject);
        }
    }
}

fn check_n8n_export(v: &mut Validator, path: &Path) {
    let doc = match read_json(path) {
        Ok(doc) => doc,
        Err(e) => {
            v.record(N8N_EXPORT_FILE, CheckStatus::Fail, e.to_string());
            return;
        }
    };
    v.record(N8N_EXPORT_FILE, CheckStatus::Pass, "valid JSON");

    let report = validate_export(&doc);
    v.record(
        "structure",
        CheckStatus::Pass,
        format!(
            "{} nodes, {} connections, {} tags",
            report.node_count, report.connection_count, report.tag_count
        ),
    );
    if report.missing_node_types.is_empty() {
        v.record("node types", CheckStatus::Pass, "all required node types present");
    } else {
        v.record(
            "node types",
            CheckStatus::Fail,
            format!("missing {}", report.missing_node_types.join(", ")),
        );
    }
    if !report.dangling_connections.is_empty() || !report.duplicate_names.is_empty() {
        v.record("graph", CheckStatus::Warn, report.problems().join("; "));
    }
}

fn check_spec(v: &mut Validator, path: &Path) {
    match read_json(path) {
        Ok(doc) => {
            let missing = missing_spec_keys(&doc);
            if missing.is_empty() {
                v.record(SPEC_EXPORT_FILE, CheckStatus::Pass, "valid workflow specification");
            } else {
                v.record(
                    SPEC_EXPORT_FILE,
                    CheckStatus::Warn,
                    format!("missing keys: {}", missing.join(", ")),
                );
            }
        }
        Err(e) => v.record(SPEC_EXPORT_FILE, CheckStatus::Fail, e.to_string()),
    }
}
