//! Workspace dependency graph: ordering and cascading version updates.
//!
//! The graph records which workspace members depend on which. Processing
//! order is a depth-first post-order, so every package comes before the
//! packages that depend on it. Cycles are detected explicitly and refused;
//! a silent partial order would hide real configuration mistakes.

use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use semver::{Version, VersionReq};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::pkgmgr::PackageManager;
use crate::version::BumpKind;
use crate::workspace::Package;

/// Errors from graph construction and ordering.
#[derive(Error, Debug)]
pub enum GraphError {
    /// The workspace dependency graph contains a cycle.
    #[error("dependency cycle between workspace packages: {}", .members.join(" -> "))]
    DependencyCycle {
        /// The packages forming the cycle, in discovery order.
        members: Vec<String>,
    },
}

/// Result alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// One node: a package and its edges to other workspace members.
#[derive(Debug, Clone)]
pub struct Node {
    /// Package directory.
    pub dir: Utf8PathBuf,
    /// Dependency names that are themselves workspace members.
    pub internal_deps: Vec<String>,
}

/// The workspace dependency graph.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, Node>,
    /// Package names in discovery order, for stable iteration.
    order: Vec<String>,
}

impl DependencyGraph {
    /// Build the graph from discovered packages.
    ///
    /// Edges are recorded for any declared dependency (production, dev,
    /// peer) whose name is another member of the workspace.
    #[instrument(skip_all, fields(packages = packages.len()))]
    pub fn build(packages: &[Package]) -> Self {
        let member_names: Vec<&str> = packages.iter().map(|p| p.name.as_str()).collect();

        let mut nodes = BTreeMap::new();
        let mut order = Vec::with_capacity(packages.len());
        for pkg in packages {
            let internal_deps: Vec<String> = pkg
                .manifest
                .dependency_names()
                .into_iter()
                .filter(|d| d != &pkg.name && member_names.contains(&d.as_str()))
                .collect();
            debug!(package = %pkg.name, deps = internal_deps.len(), "graph node");
            nodes.insert(
                pkg.name.clone(),
                Node {
                    dir: pkg.dir.clone(),
                    internal_deps,
                },
            );
            order.push(pkg.name.clone());
        }

        Self { nodes, order }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up one node.
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Names of packages that depend on `name` directly.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.order
            .iter()
            .filter(|other| {
                self.nodes
                    .get(other.as_str())
                    .is_some_and(|n| n.internal_deps.iter().any(|d| d == name))
            })
            .map(String::as_str)
            .collect()
    }

    /// Topological order: dependencies before dependents.
    ///
    /// Depth-first post-order with three-color marking; a back edge means
    /// a cycle, which is reported rather than silently tolerated.
    pub fn topo_order(&self) -> GraphResult<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Gray,
            Black,
        }

        let mut marks: BTreeMap<&str, Mark> = self
            .nodes
            .keys()
            .map(|k| (k.as_str(), Mark::White))
            .collect();
        let mut sorted = Vec::with_capacity(self.nodes.len());

        fn visit<'a>(
            graph: &'a DependencyGraph,
            name: &'a str,
            marks: &mut BTreeMap<&'a str, Mark>,
            sorted: &mut Vec<String>,
            trail: &mut Vec<String>,
        ) -> GraphResult<()> {
            match marks.get(name).copied() {
                Some(Mark::Black) => return Ok(()),
                Some(Mark::Gray) => {
                    let start = trail.iter().position(|t| t == name).unwrap_or(0);
                    let mut members: Vec<String> = trail[start..].to_vec();
                    members.push(name.to_string());
                    return Err(GraphError::DependencyCycle { members });
                }
                _ => {}
            }

            marks.insert(name, Mark::Gray);
            trail.push(name.to_string());
            if let Some(node) = graph.nodes.get(name) {
                for dep in &node.internal_deps {
                    visit(graph, dep, marks, sorted, trail)?;
                }
            }
            trail.pop();
            marks.insert(name, Mark::Black);
            sorted.push(name.to_string());
            Ok(())
        }

        let mut trail = Vec::new();
        for name in &self.order {
            visit(self, name, &mut marks, &mut sorted, &mut trail)?;
        }
        Ok(sorted)
    }
}

/// A dependency spec rewritten during a cascade.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyUpdate {
    /// The dependent package whose manifest changed.
    pub package: String,
    /// The dependency whose spec was rewritten.
    pub dependency: String,
    /// The new spec (caret range on the bumped version).
    pub spec: String,
}

/// A compatibility test failure recorded during a cascade.
#[derive(Debug, Clone, Serialize)]
pub struct TestFailure {
    /// The dependent package whose test run failed.
    pub package: String,
    /// Captured failure detail.
    pub error: String,
}

/// The result of cascading one bump through the workspace.
#[derive(Debug, Default, Serialize)]
pub struct CascadeOutcome {
    /// Dependency specs rewritten, in package order.
    pub updates: Vec<DependencyUpdate>,
    /// Non-fatal compatibility test failures.
    pub test_failures: Vec<TestFailure>,
}

/// Propagate a bumped package's new version into its dependents.
///
/// Any declared spec not already compatible with `new_version` is
/// rewritten to a caret range. Major bumps additionally run the package
/// manager's test suite in each updated dependent; failures land in
/// `test_failures` and the cascade continues regardless.
#[instrument(skip(packages, pm), fields(%bumped, %new_version))]
pub fn cascade(
    packages: &mut [Package],
    bumped: &str,
    new_version: &Version,
    kind: BumpKind,
    pm: &PackageManager,
) -> CascadeOutcome {
    let mut outcome = CascadeOutcome::default();
    let caret = format!("^{new_version}");

    for pkg in packages.iter_mut() {
        if pkg.name == bumped {
            continue;
        }
        let Some(spec) = pkg.manifest.dependency_spec(bumped) else {
            continue;
        };
        let spec = spec.to_string();

        if spec_accepts(&spec, new_version) {
            debug!(package = %pkg.name, spec, "spec already compatible");
            continue;
        }

        pkg.manifest.set_dependency_spec(bumped, &caret);
        debug!(package = %pkg.name, old = spec, new = %caret, "rewrote dependency spec");
        outcome.updates.push(DependencyUpdate {
            package: pkg.name.clone(),
            dependency: bumped.to_string(),
            spec: caret.clone(),
        });

        if kind == BumpKind::Major {
            let test = pm.test(&pkg.dir);
            if !test.success {
                warn!(package = %pkg.name, "compatibility test failed after major bump");
                outcome.test_failures.push(TestFailure {
                    package: pkg.name.clone(),
                    error: test
                        .error
                        .unwrap_or_else(|| "test run failed".to_string()),
                });
            }
        }
    }

    outcome
}

/// Whether a declared spec already accepts a version.
///
/// Unparseable specs (workspace links, URLs, tags) count as incompatible
/// so the cascade rewrites them into an explicit range.
fn spec_accepts(spec: &str, version: &Version) -> bool {
    VersionReq::parse(spec).is_ok_and(|req| req.matches(version))
}
