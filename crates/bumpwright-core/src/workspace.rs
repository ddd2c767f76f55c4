//! Workspace discovery: enumerate package directories from manifest globs.
//!
//! The root manifest's `workspaces` globs are expanded with a minimal
//! segment matcher (`*` within one path segment); this tool deliberately
//! does not ship a general glob engine.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::manifest::{Manifest, ManifestError};
use crate::version::BumpResult;

/// Errors from workspace discovery.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// The root manifest could not be read.
    #[error("failed to load root manifest: {0}")]
    RootManifest(#[from] ManifestError),

    /// Directory enumeration failed.
    #[error("failed to scan {dir}: {source}")]
    Scan {
        /// The directory being scanned.
        dir: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// One member package discovered in the workspace.
#[derive(Debug, Clone)]
pub struct Package {
    /// The package name from its manifest.
    pub name: String,
    /// Directory containing the manifest.
    pub dir: Utf8PathBuf,
    /// The parsed manifest, mutated in place during a run.
    pub manifest: Manifest,
    /// The bump applied in this run, once one exists.
    pub bump: Option<BumpResult>,
}

/// The workspace: root manifest plus member packages.
#[derive(Debug)]
pub struct Workspace {
    /// Repository root directory.
    pub root: Utf8PathBuf,
    /// The root package's manifest.
    pub root_manifest: Manifest,
    /// Member packages in discovery order.
    pub packages: Vec<Package>,
}

/// Discover the workspace under `root`.
///
/// `manifest_name` is the per-package manifest file name (normally
/// `package.json`). Member directories missing a manifest are skipped
/// with a warning; an unparsable member manifest is skipped the same way.
#[instrument(skip_all, fields(%root))]
pub fn discover(root: &Utf8Path, manifest_name: &str) -> WorkspaceResult<Workspace> {
    let root_manifest = Manifest::load(root.join(manifest_name))?;
    let globs = root_manifest.workspace_globs();
    debug!(globs = globs.len(), "expanding workspace globs");

    let mut packages = Vec::new();
    for glob in &globs {
        for dir in expand_glob(root, glob)? {
            let manifest_path = dir.join(manifest_name);
            if !manifest_path.is_file() {
                continue;
            }
            match Manifest::load(&manifest_path) {
                Ok(manifest) => {
                    let name = manifest.name().to_string();
                    debug!(%name, %dir, "discovered package");
                    packages.push(Package {
                        name,
                        dir,
                        manifest,
                        bump: None,
                    });
                }
                Err(e) => {
                    warn!(%manifest_path, error = %e, "skipping unreadable member manifest");
                }
            }
        }
    }

    Ok(Workspace {
        root: root.to_path_buf(),
        root_manifest,
        packages,
    })
}

/// Expand one workspace glob into existing directories.
///
/// Splits on `/` and walks segment by segment; `*` within a segment
/// matches directory names, anything else is taken literally.
fn expand_glob(root: &Utf8Path, glob: &str) -> WorkspaceResult<Vec<Utf8PathBuf>> {
    let mut current = vec![root.to_path_buf()];

    for segment in glob.split('/').filter(|s| !s.is_empty()) {
        let mut next = Vec::new();
        for dir in &current {
            if segment.contains('*') {
                for child in subdirectories(dir)? {
                    if let Some(name) = child.file_name()
                        && segment_matches(segment, name)
                    {
                        next.push(child);
                    }
                }
            } else {
                let child = dir.join(segment);
                if child.is_dir() {
                    next.push(child);
                }
            }
        }
        current = next;
    }

    current.sort();
    Ok(current)
}

/// List immediate subdirectories of `dir`.
fn subdirectories(dir: &Utf8Path) -> WorkspaceResult<Vec<Utf8PathBuf>> {
    let entries = dir.read_dir_utf8().map_err(|source| WorkspaceError::Scan {
        dir: dir.to_path_buf(),
        source,
    })?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| WorkspaceError::Scan {
            dir: dir.to_path_buf(),
            source,
        })?;
        let path = entry.into_path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    Ok(dirs)
}

/// Match one glob segment against one path segment (`*` wildcards only).
fn segment_matches(pattern: &str, name: &str) -> bool {
    crate::flows::pattern_matches(pattern, name)
}
