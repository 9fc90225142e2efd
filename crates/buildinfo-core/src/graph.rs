//! The finished build graph handed to the collector.
//!
//! The build tool owns dependency resolution and compilation; it supplies
//! this already-resolved structure (modules, declared dependency
//! coordinates, produced artifact files) and the pipeline never mutates it.

use std::path::PathBuf;

/// The whole build, in module declaration order.
#[derive(Debug, Clone, Default)]
pub struct BuildGraph {
    /// Modules in declaration order; collection preserves this order.
    pub modules: Vec<GraphModule>,
}

/// One module of the build.
#[derive(Debug, Clone)]
pub struct GraphModule {
    /// Module group (organization).
    pub group: String,
    /// Module name.
    pub name: String,
    /// Module version.
    pub version: String,
    /// Produced artifact files, in declaration order.
    pub artifacts: Vec<GraphArtifact>,
    /// Declared dependencies, in declaration order.
    pub dependencies: Vec<GraphDependency>,
}

/// A dependency as declared in the build script.
#[derive(Debug, Clone, Default)]
pub struct GraphDependency {
    /// Dependency group; empty means the declaration was malformed.
    pub group: String,
    /// Dependency name; empty means the declaration was malformed.
    pub name: String,
    /// Resolved version; may be empty when the build tool left it open.
    pub version: String,
    /// Configurations/scopes (e.g. `compile`, `runtime`).
    pub scopes: Vec<String>,
    /// Optional classifier.
    pub classifier: Option<String>,
    /// Optional extension when not `jar`.
    pub extension: Option<String>,
}

/// A produced file belonging to a module.
#[derive(Debug, Clone)]
pub struct GraphArtifact {
    /// Local file produced by the build.
    pub file: PathBuf,
    /// Artifact base name (usually the module name).
    pub name: String,
    /// File extension (e.g. `jar`, `war`).
    pub extension: String,
    /// Optional classifier (e.g. `sources`).
    pub classifier: Option<String>,
}
