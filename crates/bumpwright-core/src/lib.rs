//! Core library for bumpwright.
//!
//! This crate decides, for a multi-package repository, which packages need
//! a new version and what that version should be, based on commit history
//! and a small set of configurable policies.
//!
//! # Modules
//!
//! - [`commits`] - Commit classification into bump severities
//! - [`config`] - Configuration loading and management
//! - [`engine`] - Run orchestration (plan, then execute)
//! - [`error`] - Error types and result aliases
//! - [`flows`] - Branch flow matching
//! - [`git`] - Git collaborator for bump workflows
//! - [`graph`] - Dependency graph, ordering, and cascades
//! - [`manifest`] - Package manifest access
//! - [`pkgmgr`] - Package manager collaborator
//! - [`policy`] - The version-bump policy engine
//! - [`reference`] - Reference point discovery
//! - [`tactic`] - Fallback execution primitives
//! - [`version`] - Severities and semver arithmetic
//! - [`workspace`] - Workspace package discovery
//!
//! # Quick Start
//!
//! ```no_run
//! use bumpwright_core::{Config, ConfigLoader};
//! use bumpwright_core::engine;
//! use bumpwright_core::git::Git;
//!
//! let config = ConfigLoader::new()
//!     .with_user_config(true)
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! let git = Git::new(".");
//! let plan = engine::plan_run(&git, &config).expect("planning failed");
//! println!("{} package decisions", plan.decisions.len());
//! ```
#![deny(unsafe_code)]

pub mod commits;

pub mod config;

pub mod engine;

pub mod error;

pub mod flows;

pub mod git;

pub mod graph;

pub mod manifest;

pub mod pkgmgr;

pub mod policy;

pub mod reference;

pub mod tactic;

pub mod version;

pub mod workspace;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
