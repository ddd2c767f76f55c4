//! Package manager collaborator: availability, tests, installs.
//!
//! Shells out to the configured command (`npm` by default). The cascade
//! uses `test` for compatibility checks after major bumps; failures are
//! reported, never raised.

use std::process::Command;

use camino::Utf8Path;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from package manager invocation.
#[derive(Error, Debug)]
pub enum PackageManagerError {
    /// Failed to spawn the package manager process.
    #[error("failed to run {command}: {source}")]
    Exec {
        /// The configured command.
        command: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The package manager exited non-zero.
    #[error("{command} {subcommand} failed: {stderr}")]
    Command {
        /// The configured command.
        command: String,
        /// The subcommand that failed.
        subcommand: String,
        /// Captured stderr.
        stderr: String,
    },
}

/// Result alias for package manager operations.
pub type PackageManagerResult<T> = Result<T, PackageManagerError>;

/// Outcome of a compatibility test run.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    /// Whether the test suite passed.
    pub success: bool,
    /// Captured failure detail when it did not.
    pub error: Option<String>,
}

/// A package manager bound to one command name.
#[derive(Debug, Clone)]
pub struct PackageManager {
    command: String,
}

impl PackageManager {
    /// Create a collaborator for the given command (e.g. `"npm"`).
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// The configured command name.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Whether the command resolves on `PATH`.
    pub fn is_available(&self) -> bool {
        which::which(&self.command).is_ok()
    }

    /// Run the package's test suite in `dir`.
    ///
    /// Never returns `Err`: spawn failures and non-zero exits both fold
    /// into a failed [`TestOutcome`] so cascades can continue.
    #[instrument(skip(self))]
    pub fn test(&self, dir: &Utf8Path) -> TestOutcome {
        match self.run(dir, "test") {
            Ok(()) => TestOutcome {
                success: true,
                error: None,
            },
            Err(e) => {
                debug!(error = %e, "compatibility test failed");
                TestOutcome {
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Install dependencies in `dir`.
    #[instrument(skip(self))]
    pub fn install(&self, dir: &Utf8Path) -> PackageManagerResult<()> {
        self.run(dir, "install")
    }

    fn run(&self, dir: &Utf8Path, subcommand: &str) -> PackageManagerResult<()> {
        debug!(command = %self.command, subcommand, %dir, "running package manager");
        let output = Command::new(&self.command)
            .arg(subcommand)
            .current_dir(dir.as_std_path())
            .output()
            .map_err(|source| PackageManagerError::Exec {
                command: self.command.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(PackageManagerError::Command {
                command: self.command.clone(),
                subcommand: subcommand.to_string(),
                stderr,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_command_is_unavailable() {
        let pm = PackageManager::new("definitely-not-a-real-tool-9000");
        assert!(!pm.is_available());
    }

    #[test]
    fn test_on_missing_command_fails_softly() {
        let pm = PackageManager::new("definitely-not-a-real-tool-9000");
        let outcome = pm.test(Utf8Path::new("."));
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }

    #[test]
    fn install_on_missing_command_errors() {
        let pm = PackageManager::new("definitely-not-a-real-tool-9000");
        assert!(pm.install(Utf8Path::new(".")).is_err());
    }

    #[test]
    fn command_name_is_kept() {
        let pm = PackageManager::new("npm");
        assert_eq!(pm.command(), "npm");
    }
}
