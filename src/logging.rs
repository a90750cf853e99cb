//! Tracing setup: stdout plus a daily-rolling log file.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Map `LOG_LEVEL` spellings (`INFO`, `WARNING`, ...) to an `EnvFilter` directive.
pub fn filter_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" | "critical" => "error",
        _ => "info",
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `level`.
///
/// Returns the file writer's guard; keep it alive for the whole process
/// or buffered lines are lost. `None` means file logging is off.
pub fn init(level: &str, file: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level)));

    let (file_layer, guard) = match rolling_writer(file) {
        Some((writer, guard)) => (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        ),
        None => (None, None),
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
    {
        tracing::debug!(error = %e, "Global subscriber already installed");
    }

    guard
}

fn rolling_writer(
    file: &Path,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = match file.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    let name = file.file_name()?.to_os_string();

    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("Warning: cannot create log directory {}: {e}", dir.display());
        return None;
    }

    let appender = tracing_appender::rolling::daily(dir, name);
    Some(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_spellings() {
        assert_eq!(filter_directive("INFO"), "info");
        assert_eq!(filter_directive("WARNING"), "warn");
        assert_eq!(filter_directive("Debug"), "debug");
        assert_eq!(filter_directive("CRITICAL"), "error");
        assert_eq!(filter_directive("nonsense"), "info");
    }
}
