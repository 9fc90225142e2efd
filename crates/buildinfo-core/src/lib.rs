//! Build-info extraction and publication engine.
//!
//! The pipeline has three stages, fed by configuration:
//!
//! 1. [`collect`] turns the build tool's finished [`graph::BuildGraph`]
//!    into normalized [`buildinfo_types::Module`] records (coordinates,
//!    deployment paths, cached checksums).
//! 2. [`assemble`] merges modules, captured environment properties, and
//!    run metadata into one immutable [`buildinfo_types::BuildInfo`].
//! 3. [`engine::Publisher`] uploads artifacts, generated descriptors, and
//!    finally the build-info document, with retry, a bounded worker pool,
//!    and cancellation.
//!
//! Credentials and publication specs come from `buildinfo-config`; the
//! HTTP surface lives in `buildinfo-client`.
//!
//! # Example
//!
//! ```no_run
//! use buildinfo_config::{Credentials, PublicationRegistry, PublisherOptions};
//! use buildinfo_client::RepositoryClient;
//! use buildinfo_core::{BuildMetadata, CancelToken, ProcessEnv, Publisher, assemble, collect};
//! use buildinfo_core::graph::BuildGraph;
//! use chrono::Utc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = BuildGraph::default(); // supplied by the build tool
//! let modules = collect(&graph)?;
//!
//! let metadata = BuildMetadata {
//!     name: "demo".to_string(),
//!     number: "7".to_string(),
//!     started: Utc::now(),
//!     duration_millis: 0,
//!     status: None,
//! };
//! let build = assemble(modules, &metadata, &ProcessEnv, true)?;
//!
//! let credentials = Credentials {
//!     base_url: "https://repo.example.com/artifactory".to_string(),
//!     username: "deployer".to_string(),
//!     password: Some("s3cret".to_string()),
//! };
//! let publisher = Publisher::new(
//!     RepositoryClient::new(&credentials),
//!     PublisherOptions::default(),
//!     PublicationRegistry::new(),
//! );
//! let receipt = publisher.publish(&build, &CancelToken::new())?;
//! assert!(receipt.is_success());
//! # Ok(())
//! # }
//! ```

pub mod assemble;
pub mod collect;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod events;
pub mod graph;

pub use assemble::{BuildMetadata, EnvProvider, ProcessEnv, assemble};
pub use collect::collect;
pub use engine::{CancelToken, Publisher};
pub use error::PublishError;
