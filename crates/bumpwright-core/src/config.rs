//! Configuration loading and discovery.
//!
//! This module provides configuration file discovery by:
//! 1. Walking up from the current directory to find project config
//! 2. Loading user config from XDG config directory
//! 3. Merging with sensible defaults
//!
//! # Supported formats
//!
//! The following configuration file formats are supported:
//! - TOML (`.toml`)
//! - YAML (`.yaml`, `.yml`)
//! - JSON (`.json`)
//!
//! # Config file locations (in order of precedence, highest first):
//! - `.bumpwright.<ext>` in current directory or any parent
//! - `bumpwright.<ext>` in current directory or any parent
//! - `~/.config/bumpwright/config.<ext>` (user config)
//!
//! Where `<ext>` is one of: `toml`, `yaml`, `yml`, `json`
//!
//! Validation is fatal and happens before any mutation: a run never
//! touches the working tree under a config whose commit templates are
//! missing required placeholders or whose flows are malformed.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::flows::Flow;

/// The configuration for bumpwright.
///
/// Deserialized from config files found during discovery (TOML, YAML, or
/// JSON). Everything has a default; config values act as overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Per-package manifest file name.
    pub manifest: ManifestConfig,
    /// Branch rules keyed by branch pattern.
    pub branches: BTreeMap<String, BranchRule>,
    /// Configured flows, matched against the active branch in order.
    pub flows: Vec<Flow>,
    /// History scan bounds for reference discovery.
    pub limits: Limits,
    /// Package manager used for compatibility testing.
    pub package_manager: PackageManagerConfig,
    /// Commit message templates.
    pub templates: Templates,
}

/// Manifest file naming.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ManifestConfig {
    /// File name of the per-package manifest.
    pub file: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            file: "package.json".to_string(),
        }
    }
}

/// Rules for one branch pattern.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BranchRule {
    /// Whether history rewrites and force pushes are forbidden here.
    pub protected: bool,
    /// Whether versions landing on this branch are tagged.
    pub tags: bool,
}

/// Bounds on history scans during reference discovery.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Limits {
    /// Recent commits paired against the base when a plain merge-base
    /// fails.
    pub merge_base_lookback: usize,
    /// Maximum commits inspected by the version-field tactics.
    pub max_version_scan: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            merge_base_lookback: 20,
            max_version_scan: 50,
        }
    }
}

/// Package manager selection.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PackageManagerConfig {
    /// Command invoked for `test`/`install` (e.g. `"npm"`).
    pub command: String,
}

impl Default for PackageManagerConfig {
    fn default() -> Self {
        Self {
            command: "npm".to_string(),
        }
    }
}

/// Commit message templates with `{placeholder}` interpolation.
///
/// `version_commit` requires `{package}` and `{version}`;
/// `dependency_commit` requires `{package}` and `{dependency}`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Templates {
    /// Message for a package version bump commit.
    pub version_commit: String,
    /// Message for a cascaded dependency update commit.
    pub dependency_commit: String,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            version_commit: "chore(release): {package} {version}".to_string(),
            dependency_commit: "chore(deps): {package} requires {dependency} {version}"
                .to_string(),
        }
    }
}

impl Templates {
    /// Render the version commit message.
    pub fn render_version(&self, package: &str, version: &str) -> String {
        self.version_commit
            .replace("{package}", package)
            .replace("{version}", version)
    }

    /// Render the dependency update commit message.
    pub fn render_dependency(&self, package: &str, dependency: &str, version: &str) -> String {
        self.dependency_commit
            .replace("{package}", package)
            .replace("{dependency}", dependency)
            .replace("{version}", version)
    }
}

impl Config {
    /// Validate the configuration before any mutation happens.
    ///
    /// Checks flow shapes, branch patterns, and template placeholders.
    pub fn validate(&self) -> ConfigResult<()> {
        for flow in &self.flows {
            if flow.from.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "flow '{}' has an empty 'from' pattern",
                    flow.name
                )));
            }
        }

        for pattern in self.branches.keys() {
            if pattern.is_empty() {
                return Err(ConfigError::Invalid(
                    "branch rules cannot use an empty pattern".to_string(),
                ));
            }
        }

        for placeholder in ["{package}", "{version}"] {
            if !self.templates.version_commit.contains(placeholder) {
                return Err(ConfigError::Invalid(format!(
                    "version commit template is missing {placeholder}"
                )));
            }
        }
        for placeholder in ["{package}", "{dependency}"] {
            if !self.templates.dependency_commit.contains(placeholder) {
                return Err(ConfigError::Invalid(format!(
                    "dependency commit template is missing {placeholder}"
                )));
            }
        }

        Ok(())
    }

    /// The branch rule matching a branch name, if any.
    ///
    /// Patterns are matched the same way flows match branches; the first
    /// matching rule in key order wins.
    pub fn branch_rule(&self, branch: &str) -> Option<&BranchRule> {
        self.branches
            .iter()
            .find(|(pattern, _)| crate::flows::pattern_matches(pattern, branch))
            .map(|(_, rule)| rule)
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "bumpwright";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Starting directory for project config search.
    project_search_root: Option<Utf8PathBuf>,
    /// Whether to include user config from XDG directory.
    include_user_config: bool,
    /// Stop searching when we hit a directory containing this file/dir.
    boundary_marker: Option<String>,
    /// Explicit config files to load (for testing or programmatic use).
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Set the starting directory for project config search.
    ///
    /// The loader will walk up from this directory looking for config files.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/bumpwright/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Set a boundary marker to stop directory traversal.
    ///
    /// When walking up directories, stop if we find a directory containing
    /// this file or directory name. Default is `.git`.
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary_marker = Some(marker.into());
        self
    }

    /// Disable boundary marker (search all the way to filesystem root).
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add an explicit config file to load.
    ///
    /// Files are loaded in order, with later files taking precedence.
    /// Explicit files are loaded after discovered files.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration, merging all discovered sources.
    ///
    /// Precedence (highest to lowest):
    /// 1. Explicit files (in order added via `with_file`)
    /// 2. Project config (closest to search root)
    /// 3. User config (`~/.config/bumpwright/config.<ext>`)
    /// 4. Default values
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Start with user config (lowest precedence of file sources)
        if self.include_user_config
            && let Some(user_config) = self.find_user_config()
        {
            figment = Self::merge_file(figment, &user_config);
        }

        // Add project config
        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            figment = Self::merge_file(figment, &project_config);
        }

        // Add explicit files (highest precedence)
        for file in &self.explicit_files {
            figment = Self::merge_file(figment, file);
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::info!(
            log_level = config.log_level.as_str(),
            flows = config.flows.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Find project config by walking up from the given directory.
    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            // Check for boundary marker
            if let Some(ref marker) = self.boundary_marker {
                let marker_path = dir.join(marker);
                if marker_path.exists() && dir != start {
                    // Found boundary in a parent dir, stop searching
                    break;
                }
            }

            // Check for config files in this directory (try each extension)
            for ext in CONFIG_EXTENSIONS {
                // Try dotfile first (.bumpwright.toml)
                let dotfile = dir.join(format!(".{APP_NAME}.{ext}"));
                if dotfile.is_file() {
                    return Some(dotfile);
                }

                // Then try regular name (bumpwright.toml)
                let regular = dir.join(format!("{APP_NAME}.{ext}"));
                if regular.is_file() {
                    return Some(regular);
                }
            }

            current = dir.parent().map(Utf8Path::to_path_buf);
        }

        None
    }

    /// Find user config in XDG config directory.
    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("", "", APP_NAME)?;
        let config_dir = proj_dirs.config_dir();

        // Try each supported extension
        for ext in CONFIG_EXTENSIONS {
            let config_path = config_dir.join(format!("config.{ext}"));
            if config_path.is_file() {
                return Utf8PathBuf::from_path_buf(config_path).ok();
            }
        }

        None
    }

    /// Merge a config file into the figment, detecting format from extension.
    fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
        match path.extension() {
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.merge(Json::file_exact(path.as_str())),
            _ => figment.merge(Toml::file_exact(path.as_str())),
        }
    }
}

/// Find the project config file path without loading it.
///
/// Useful for commands that need to know where config is located.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    ConfigLoader::new()
        .with_project_search(start.as_ref())
        .without_boundary_marker()
        .find_project_config(start.as_ref())
}

/// Get the user config directory path.
///
/// Returns `~/.config/bumpwright/` on Linux, `~/Library/Application
/// Support/bumpwright/` on macOS, and equivalent on other platforms.
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("", "", APP_NAME)?;
    Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf()).ok()
}
