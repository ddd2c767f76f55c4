//! Package manifest access: read, mutate, save.
//!
//! A manifest is a JSON document with required `name` and `version`,
//! optional `workspaces`, and dependency maps. The whole document is kept
//! as a [`serde_json::Value`] so unrelated keys round-trip byte-for-byte
//! (modulo formatting); typed accessors sit on top. Saves re-serialize
//! with 2-space indentation and a trailing newline.

use camino::{Utf8Path, Utf8PathBuf};
use semver::Version;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::debug;

use crate::version;

/// Dependency sections scanned for internal edges and cascade rewrites.
pub const DEPENDENCY_KEYS: &[&str] = &["dependencies", "devDependencies", "peerDependencies"];

/// Errors from manifest handling.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Failed to read or write the manifest file.
    #[error("failed to access {path}: {source}")]
    Io {
        /// The manifest path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid JSON.
    #[error("invalid manifest JSON in {path}: {source}")]
    Parse {
        /// The manifest path.
        path: Utf8PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The document is missing a required field.
    #[error("manifest {path} is missing required field '{field}'")]
    MissingField {
        /// The manifest path.
        path: Utf8PathBuf,
        /// The missing field name.
        field: &'static str,
    },
}

/// Result alias for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// One package's manifest document plus its location.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: Utf8PathBuf,
    doc: Value,
}

impl Manifest {
    /// Load a manifest from disk.
    pub fn load(path: impl AsRef<Utf8Path>) -> ManifestResult<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = std::fs::read_to_string(&path).map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(path, &raw)
    }

    /// Parse a manifest from an in-memory document (e.g. `git show` output).
    ///
    /// `path` records where the document lives (or would live) on disk.
    pub fn parse(path: impl AsRef<Utf8Path>, raw: &str) -> ManifestResult<Self> {
        let path = path.as_ref().to_path_buf();
        let doc: Value = serde_json::from_str(raw).map_err(|source| ManifestError::Parse {
            path: path.clone(),
            source,
        })?;
        let manifest = Self { path, doc };
        // `name` is the only hard requirement; a missing version coerces
        // to 0.0.0 downstream.
        if manifest.name_raw().is_none() {
            return Err(ManifestError::MissingField {
                path: manifest.path,
                field: "name",
            });
        }
        Ok(manifest)
    }

    /// Where this manifest lives.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn name_raw(&self) -> Option<&str> {
        self.doc.get("name").and_then(Value::as_str)
    }

    /// The package name.
    pub fn name(&self) -> &str {
        self.name_raw().unwrap_or_default()
    }

    /// The raw version string, when present.
    pub fn version_raw(&self) -> Option<&str> {
        self.doc.get("version").and_then(Value::as_str)
    }

    /// The package version, coerced to valid semver (missing or invalid
    /// versions become 0.0.0).
    pub fn version(&self) -> Version {
        version::coerce(self.version_raw().unwrap_or_default())
    }

    /// Overwrite the version field.
    pub fn set_version(&mut self, next: &Version) {
        if let Some(obj) = self.doc.as_object_mut() {
            obj.insert("version".to_owned(), json!(next.to_string()));
        }
    }

    /// Workspace member globs, from `workspaces: [...]` or
    /// `workspaces: {packages: [...]}`.
    pub fn workspace_globs(&self) -> Vec<String> {
        let node = match self.doc.get("workspaces") {
            Some(Value::Array(items)) => Some(items),
            Some(Value::Object(map)) => map.get("packages").and_then(Value::as_array),
            _ => None,
        };
        node.map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
    }

    /// Names declared in any dependency section.
    pub fn dependency_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for key in DEPENDENCY_KEYS {
            if let Some(map) = self.section(key) {
                names.extend(map.keys().cloned());
            }
        }
        names.sort_unstable();
        names.dedup();
        names
    }

    /// The declared spec for a dependency, from the first section that
    /// carries it.
    pub fn dependency_spec(&self, dep: &str) -> Option<&str> {
        DEPENDENCY_KEYS
            .iter()
            .filter_map(|key| self.section(key))
            .find_map(|map| map.get(dep).and_then(Value::as_str))
    }

    /// Rewrite a dependency's spec in every section that declares it.
    ///
    /// Returns whether anything changed.
    pub fn set_dependency_spec(&mut self, dep: &str, spec: &str) -> bool {
        let mut changed = false;
        for key in DEPENDENCY_KEYS {
            if let Some(map) = self.section_mut(key)
                && map.contains_key(dep)
            {
                map.insert(dep.to_owned(), json!(spec));
                changed = true;
            }
        }
        changed
    }

    fn section(&self, key: &str) -> Option<&Map<String, Value>> {
        self.doc.get(key).and_then(Value::as_object)
    }

    fn section_mut(&mut self, key: &str) -> Option<&mut Map<String, Value>> {
        self.doc.get_mut(key).and_then(Value::as_object_mut)
    }

    /// Serialize the document the way it is persisted on disk.
    pub fn render(&self) -> String {
        let mut out = serde_json::to_string_pretty(&self.doc).unwrap_or_else(|_| "{}".to_owned());
        out.push('\n');
        out
    }

    /// Persist the document: 2-space indentation, trailing newline,
    /// unrelated keys untouched.
    pub fn save(&self) -> ManifestResult<()> {
        debug!(path = %self.path, "saving manifest");
        std::fs::write(&self.path, self.render()).map_err(|source| ManifestError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
