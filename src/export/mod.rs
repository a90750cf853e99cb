//! Workflow export: the screening process as n8n JSON plus a tool-neutral spec.

pub mod n8n;
pub mod validate;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::config::Settings;
use crate::error::ExportError;

pub use n8n::{N8nWorkflow, WorkflowSpec, build_spec, build_workflow};
pub use validate::{ExportReport, validate_export, validate_export_file};

pub const N8N_EXPORT_FILE: &str = "n8n_workflow_export.json";
pub const SPEC_EXPORT_FILE: &str = "workflow_export.json";

/// Paths written by `write_exports()`.
#[derive(Debug, Clone, Serialize)]
pub struct ExportPaths {
    pub n8n_workflow: PathBuf,
    pub workflow_spec: PathBuf,
}

/// Write both export files into `dir`, creating it if needed.
pub fn write_exports(settings: &Settings, dir: &Path) -> Result<ExportPaths, ExportError> {
    std::fs::create_dir_all(dir)?;

    let paths = ExportPaths {
        n8n_workflow: dir.join(N8N_EXPORT_FILE),
        workflow_spec: dir.join(SPEC_EXPORT_FILE),
    };
    write_json(&paths.n8n_workflow, &build_workflow(settings))?;
    write_json(&paths.workflow_spec, &build_spec(settings))?;

    info!(
        n8n = %paths.n8n_workflow.display(),
        spec = %paths.workflow_spec.display(),
        "Workflow exports written"
    );
    Ok(paths)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ExportError> {
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    std::fs::write(path, content)?;
    Ok(())
}
