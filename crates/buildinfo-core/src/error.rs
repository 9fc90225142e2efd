//! Error taxonomy for the extraction and publication pipeline.
//!
//! Configuration and collection problems are fatal before any network call;
//! once uploading has begun, per-item failures are reported through the
//! [`PublishReceipt`](buildinfo_types::PublishReceipt) instead of an `Err`,
//! so partially completed runs stay observable.

use std::path::PathBuf;

use buildinfo_client::ClientError;
use buildinfo_config::ConfigError;
use buildinfo_types::MalformedCoordinate;

/// Fatal pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Missing or invalid credentials, metadata, or publication name.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// A dependency or module coordinate was missing its group or name.
    #[error("module `{module}`: {source}")]
    MalformedCoordinate {
        /// The module whose graph entry was malformed.
        module: String,
        #[source]
        source: MalformedCoordinate,
    },

    /// An artifact file could not be read while computing checksums.
    #[error("module `{module}`: failed to read artifact {path}: {source}")]
    ArtifactRead {
        /// The owning module id.
        module: String,
        /// Local path of the unreadable file.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The (name, number) pair is already published and overwrite is off.
    #[error("build `{name}` #{number} is already published; enable overwrite to replace it")]
    DuplicatePublish {
        /// Build name.
        name: String,
        /// Build number.
        number: String,
    },

    /// The duplicate-publish lookup itself failed.
    #[error("could not check for an existing build: {source}")]
    Preflight {
        #[source]
        source: ClientError,
    },
}
