//! Workflow orchestration and lifetime statistics.

pub mod orchestrator;
pub mod stats;

pub use orchestrator::{
    CycleReport, EmailOutcome, TestEmail, TestOutcome, WorkflowOrchestrator, WorkflowStatus,
};
pub use stats::WorkflowStats;
