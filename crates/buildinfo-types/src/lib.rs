//! Core domain types for the build-info publisher.
//!
//! This crate provides the fundamental records shared across the workspace:
//! module coordinates, dependencies, artifacts, the build-info document
//! itself, and the receipt types describing a publish run's outcome.
//! Everything here is plain immutable data; behavior lives in the
//! collector, assembler, and publish engine crates.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Format version written into every build-info document.
///
/// Matches the descriptor schema version the repository manager accepts.
pub const BUILD_INFO_VERSION: &str = "1.0.1";

/// Version placeholder for dependency coordinates that omit a version.
pub const UNSPECIFIED_VERSION: &str = "unspecified";

/// Error classification for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Error is transient and should be retried
    #[default]
    Retryable,
    /// Error outcome is unknown (the upload may have landed)
    Ambiguous,
    /// Error is permanent and should not be retried
    Permanent,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Retryable => write!(f, "retryable"),
            ErrorClass::Ambiguous => write!(f, "ambiguous"),
            ErrorClass::Permanent => write!(f, "permanent"),
        }
    }
}

/// A coordinate failed to parse or validate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed coordinate `{raw}`: {reason}")]
pub struct MalformedCoordinate {
    /// The offending input.
    pub raw: String,
    /// Which part was missing or invalid.
    pub reason: &'static str,
}

/// A `group:name:version` identifier for a module or dependency.
///
/// Serializes as the colon-joined string form, which is also how the
/// repository manager renders ids in build-info documents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coordinate {
    pub group: String,
    pub name: String,
    pub version: String,
}

impl Coordinate {
    /// Create a coordinate, requiring all three parts to be non-empty.
    pub fn new(group: &str, name: &str, version: &str) -> Result<Self, MalformedCoordinate> {
        let raw = format!("{group}:{name}:{version}");
        if group.is_empty() {
            return Err(MalformedCoordinate {
                raw,
                reason: "missing group",
            });
        }
        if name.is_empty() {
            return Err(MalformedCoordinate {
                raw,
                reason: "missing name",
            });
        }
        if version.is_empty() {
            return Err(MalformedCoordinate {
                raw,
                reason: "missing version",
            });
        }
        Ok(Self {
            group: group.to_string(),
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    /// Parse a `group:name[:version]` string.
    ///
    /// Group and name must be non-empty. A missing or empty version is
    /// normalized to [`UNSPECIFIED_VERSION`], which is how build tools
    /// report dependencies whose version is resolved elsewhere.
    pub fn parse(raw: &str) -> Result<Self, MalformedCoordinate> {
        let mut parts = raw.splitn(3, ':');
        let group = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();
        let version = match parts.next() {
            Some(v) if !v.is_empty() => v,
            _ => UNSPECIFIED_VERSION,
        };
        if group.is_empty() {
            return Err(MalformedCoordinate {
                raw: raw.to_string(),
                reason: "missing group",
            });
        }
        if name.is_empty() {
            return Err(MalformedCoordinate {
                raw: raw.to_string(),
                reason: "missing name",
            });
        }
        Ok(Self {
            group: group.to_string(),
            name: name.to_string(),
            version: version.to_string(),
        })
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)
    }
}

impl FromStr for Coordinate {
    type Err = MalformedCoordinate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Coordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Coordinate::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A declared dependency of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Coordinate in `group:name:version` form.
    pub id: Coordinate,
    /// Configurations/scopes the dependency belongs to (e.g. `compile`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    /// Optional artifact classifier (e.g. `sources`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    /// Optional artifact extension when it differs from `jar`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

/// A produced file belonging to a module, with its deployment target.
///
/// The local file is owned by the build tool and treated as read-only;
/// checksums are computed once at collection time and cached here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// File name as it appears in the build-info document.
    pub name: String,
    /// Path to the produced file on the local filesystem.
    pub local_path: PathBuf,
    /// Repository-relative deployment path (Maven layout).
    pub remote_path: String,
    /// SHA-1 checksum of the file contents, hex-encoded.
    pub sha1: String,
    /// MD5 checksum of the file contents, hex-encoded.
    pub md5: String,
}

/// One build module: its id plus ordered artifacts and dependencies.
///
/// Created by the collector and immutable afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Module coordinate (all three parts required).
    pub id: Coordinate,
    /// Artifacts in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    /// Dependencies in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
}

/// The agent that produced a build (tool name + version).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    pub version: String,
}

/// The assembled build-info document.
///
/// Immutable once assembled; the publish engine enforces the
/// at-most-once-per-(name, number) rule. Properties use a `BTreeMap` so
/// serialization is deterministic for identical inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Document format version.
    pub version: String,
    /// Build name.
    pub name: String,
    /// Build number.
    pub number: String,
    /// When the build started.
    pub started: DateTime<Utc>,
    /// Wall-clock duration of the build in milliseconds.
    pub duration_millis: u64,
    /// Optional promotion status (e.g. `staged`, `released`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Build agent, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<Agent>,
    /// Captured environment properties (key unique, sorted).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    /// Modules in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<Module>,
}

impl BuildInfo {
    /// Count of artifacts across all modules.
    pub fn artifact_count(&self) -> usize {
        self.modules.iter().map(|m| m.artifacts.len()).sum()
    }
}

/// What kind of item a receipt entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// A module artifact file.
    Artifact,
    /// A generated POM descriptor.
    Pom,
    /// A generated Ivy descriptor.
    Ivy,
    /// The build-info document itself.
    BuildInfo,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Artifact => write!(f, "artifact"),
            ItemKind::Pom => write!(f, "pom"),
            ItemKind::Ivy => write!(f, "ivy"),
            ItemKind::BuildInfo => write!(f, "build-info"),
        }
    }
}

/// Outcome of a single upload item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ItemState {
    /// Upload completed and was acknowledged by the repository.
    Uploaded,
    /// Upload failed after exhausting retries (or fatally).
    Failed {
        /// Error classification at the point of failure.
        class: ErrorClass,
        /// Human-readable message with enough context to act on.
        message: String,
    },
    /// Never started because an earlier fatal error or cancellation
    /// stopped the run.
    NotAttempted,
    /// Deliberately skipped (publication spec disabled this kind).
    Skipped {
        /// Reason for skipping.
        reason: String,
    },
}

/// Receipt entry for one upload item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReceipt {
    /// Module the item belongs to (`"build"` for the build-info document).
    pub module: String,
    /// Repository-relative path (or the descriptor endpoint).
    pub path: String,
    /// Item kind.
    pub kind: ItemKind,
    /// Final state.
    #[serde(flatten)]
    pub state: ItemState,
}

/// Overall result of a publish run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// Every item uploaded.
    Success,
    /// The run was stopped (cancellation) after some items uploaded.
    Partial,
    /// A fatal error aborted the run.
    Failed,
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallStatus::Success => write!(f, "success"),
            OverallStatus::Partial => write!(f, "partial"),
            OverallStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Full receipt for one publish run.
///
/// The receipt enumerates every item the engine planned, in plan order,
/// so completed vs failed vs never-attempted work is always visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Build name the run published.
    pub build_name: String,
    /// Build number the run published.
    pub build_number: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Per-item outcomes in plan order.
    pub items: Vec<ItemReceipt>,
    /// Overall status.
    pub status: OverallStatus,
}

impl PublishReceipt {
    /// True when every planned item uploaded.
    pub fn is_success(&self) -> bool {
        self.status == OverallStatus::Success
    }

    /// Number of items that uploaded successfully.
    pub fn uploaded_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.state == ItemState::Uploaded)
            .count()
    }
}
