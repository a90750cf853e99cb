//! Candidate screener: inbox-driven résumé screening with spreadsheet tracking.

pub mod channels;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod screening;
pub mod store;
pub mod validation;
pub mod workflow;
