//! Observability setup: structured logging.
//!
//! Stdout is reserved for command output (plans, reports, JSON), so all
//! logging goes to a JSONL file or stderr. The log target resolves in
//! order: `BUMPWRIGHT_LOG_PATH`, `BUMPWRIGHT_LOG_DIR`, the configured
//! `log_dir`, then a stderr fallback.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "BUMPWRIGHT_LOG_PATH";
const ENV_LOG_DIR: &str = "BUMPWRIGHT_LOG_DIR";
const LOG_FILE: &str = "bumpwright.jsonl";

/// Guard that must be held for the lifetime of the application to ensure
/// buffered log lines are flushed on exit.
pub struct ObservabilityGuard {
    _log_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Initialize logging.
///
/// `config_log_dir` is the directory from the loaded configuration, used
/// when no environment override is present. Returns a guard that must be
/// held for the application lifetime.
pub fn init_observability(
    config_log_dir: Option<PathBuf>,
    env_filter: EnvFilter,
) -> Result<ObservabilityGuard> {
    let (writer, guard) = match resolve_log_path(config_log_dir.as_deref()) {
        Some(path) => match open_appender(&path) {
            Ok(pair) => pair,
            Err(err) => {
                // Never fall back to stdout; command output lives there.
                eprintln!("Warning: {err}. Falling back to stderr logging.");
                tracing_appender::non_blocking(std::io::stderr())
            }
        },
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let log_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(writer)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(log_layer)
        .init();

    tracing::debug!("observability initialized");

    Ok(ObservabilityGuard { _log_guard: guard })
}

/// Build an `EnvFilter` based on CLI flags and environment.
///
/// Priority: quiet flag > verbose flag > `RUST_LOG` env > `default_level`
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }

    if verbose > 0 {
        let level = match verbose {
            1 => "debug",
            _ => "trace",
        };
        return EnvFilter::new(level);
    }

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Decide where the log file lives, if anywhere.
fn resolve_log_path(config_log_dir: Option<&Path>) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(ENV_LOG_PATH) {
        return Some(PathBuf::from(path));
    }
    if let Ok(dir) = std::env::var(ENV_LOG_DIR) {
        return Some(Path::new(&dir).join(LOG_FILE));
    }
    config_log_dir.map(|dir| dir.join(LOG_FILE))
}

/// Open a non-blocking appender for the given file path.
fn open_appender(
    path: &Path,
) -> Result<(
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
)> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .map_or_else(|| LOG_FILE.to_string(), |n| n.to_string_lossy().to_string());
    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_verbose() {
        let filter = env_filter(true, 3, "info");
        assert_eq!(filter.to_string(), "error");
    }

    #[test]
    fn verbose_levels() {
        assert_eq!(env_filter(false, 1, "info").to_string(), "debug");
        assert_eq!(env_filter(false, 2, "info").to_string(), "trace");
    }

    #[test]
    fn config_dir_used_without_env() {
        // Only assert the shape; env vars may be set in the host shell.
        if std::env::var(ENV_LOG_PATH).is_err() && std::env::var(ENV_LOG_DIR).is_err() {
            let path = resolve_log_path(Some(Path::new("/tmp/logs")));
            assert_eq!(path, Some(PathBuf::from("/tmp/logs/bumpwright.jsonl")));
        }
    }

    #[test]
    fn no_target_means_stderr() {
        if std::env::var(ENV_LOG_PATH).is_err() && std::env::var(ENV_LOG_DIR).is_err() {
            assert_eq!(resolve_log_path(None), None);
        }
    }
}
