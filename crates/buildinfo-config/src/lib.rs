//! Layered configuration for the build-info publisher.
//!
//! Repository credentials and publisher options come from an ordered stack
//! of [`ConfigSource`] providers: environment variables (under a deployment
//! prefix such as `ARTIFACTORY` or `PLATFORM`), TOML property files, and
//! explicit overrides. Later sources win per field. Everything is resolved
//! once at startup and read-only for the rest of the run.
//!
//! # Example
//!
//! ```
//! use buildinfo_config::{MapSource, resolve_credentials};
//!
//! let mut overrides = MapSource::new("overrides");
//! overrides.set("url", "https://repo.example.com/artifactory");
//! overrides.set("username", "deployer");
//! overrides.set("password", "s3cret");
//!
//! let creds = resolve_credentials(&[&overrides], false).expect("resolve");
//! assert_eq!(creds.base_url, "https://repo.example.com/artifactory");
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use buildinfo_retry::BackoffConfig;
use serde::{Deserialize, Serialize};

/// Recognized credential field: repository base URL.
pub const KEY_URL: &str = "url";
/// Recognized credential field: deploy username.
pub const KEY_USERNAME: &str = "username";
/// Recognized credential field: deploy password.
pub const KEY_PASSWORD: &str = "password";

/// Configuration and registry lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required credential field was absent from every source.
    #[error("missing credential `{field}`: set it via environment, property file, or override")]
    MissingCredential {
        /// The absent field (`url`, `username`, or `password`).
        field: &'static str,
    },
    /// A publication name was requested that no spec was registered under.
    #[error("unknown publication `{name}`")]
    UnknownPublication {
        /// The requested publication name.
        name: String,
    },
    /// Build metadata failed validation before assembly.
    #[error("invalid build metadata: {reason}")]
    InvalidMetadata {
        /// What was wrong.
        reason: String,
    },
}

/// A provider of string-keyed configuration values.
///
/// Implementations read the process environment, a property file, or an
/// in-memory map; the resolver never touches globals directly, so tests can
/// substitute any source.
pub trait ConfigSource {
    /// Look up a value for a recognized key.
    fn get(&self, key: &str) -> Option<String>;

    /// Short label for diagnostics (e.g. the env prefix or file name).
    fn label(&self) -> &str;
}

/// Environment-variable source under a deployment prefix.
///
/// A key `url` with prefix `ARTIFACTORY` reads `ARTIFACTORY_URL`. The
/// `ARTIFACTORY_*` and `PLATFORM_*` variable families seen in deployment
/// scripts are two instances of this one source, not separate mechanisms.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
}

impl EnvSource {
    /// Create a source reading `{PREFIX}_{KEY}` variables.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }
}

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        let var = format!("{}_{}", self.prefix, key.to_uppercase());
        std::env::var(var).ok().filter(|v| !v.is_empty())
    }

    fn label(&self) -> &str {
        &self.prefix
    }
}

/// Property-file source backed by a flat TOML table of strings.
#[derive(Debug, Clone)]
pub struct FileSource {
    label: String,
    values: BTreeMap<String, String>,
}

impl FileSource {
    /// Load a property file. Non-string values are rejected.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read property file {}", path.display()))?;
        let values: BTreeMap<String, String> = toml::from_str(&raw)
            .with_context(|| format!("failed to parse property file {}", path.display()))?;
        Ok(Self {
            label: path.display().to_string(),
            values,
        })
    }
}

impl ConfigSource for FileSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// In-memory source for explicit overrides and tests.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    label: String,
    values: BTreeMap<String, String>,
}

impl MapSource {
    /// Create an empty source with a diagnostic label.
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            values: BTreeMap::new(),
        }
    }

    /// Set a value, replacing any previous one.
    pub fn set(&mut self, key: &str, value: &str) -> &mut Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Resolved repository credentials.
///
/// Resolved once per run and never persisted. The password is deliberately
/// excluded from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Repository manager base URL, without a trailing slash.
    pub base_url: String,
    /// Deploy username.
    pub username: String,
    /// Deploy password; `None` only for anonymous repositories.
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Resolve credentials from an ordered stack of sources.
///
/// Later sources override earlier ones for each field independently.
/// URL and username are always required; a missing password is permitted
/// only when `anonymous` is set.
pub fn resolve_credentials(
    sources: &[&dyn ConfigSource],
    anonymous: bool,
) -> Result<Credentials, ConfigError> {
    let mut base_url = None;
    let mut username = None;
    let mut password = None;

    for source in sources {
        if let Some(v) = source.get(KEY_URL) {
            base_url = Some(v);
        }
        if let Some(v) = source.get(KEY_USERNAME) {
            username = Some(v);
        }
        if let Some(v) = source.get(KEY_PASSWORD) {
            password = Some(v);
        }
    }

    let base_url = base_url.ok_or(ConfigError::MissingCredential { field: KEY_URL })?;
    let username = username.ok_or(ConfigError::MissingCredential {
        field: KEY_USERNAME,
    })?;
    if password.is_none() && !anonymous {
        return Err(ConfigError::MissingCredential {
            field: KEY_PASSWORD,
        });
    }

    Ok(Credentials {
        base_url: base_url.trim_end_matches('/').to_string(),
        username,
        password,
    })
}

/// Artifact kinds a publication can enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// The module's main artifacts (jars and friends).
    Main,
    /// A generated POM descriptor.
    Pom,
    /// A generated Ivy descriptor.
    Ivy,
}

/// A named publication definition the publisher consults.
///
/// Loaded from configuration at startup and read-only during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationSpec {
    /// Publication name (e.g. `mavenJava`, `ivyJava`).
    pub name: String,
    /// Enabled artifact kinds.
    pub kinds: BTreeSet<ArtifactKind>,
    /// Target publication names this spec applies to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publications: Vec<String>,
}

impl PublicationSpec {
    /// Build a spec from the publisher's global toggles.
    pub fn from_options(name: &str, options: &PublisherOptions) -> Self {
        let mut kinds = BTreeSet::new();
        if options.publish_artifacts {
            kinds.insert(ArtifactKind::Main);
        }
        if options.publish_pom {
            kinds.insert(ArtifactKind::Pom);
        }
        if options.publish_ivy {
            kinds.insert(ArtifactKind::Ivy);
        }
        Self {
            name: name.to_string(),
            kinds,
            publications: Vec::new(),
        }
    }

    /// Whether a given artifact kind is enabled.
    pub fn publishes(&self, kind: ArtifactKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// Keyed store of publication specs: load once, read many.
#[derive(Debug, Clone, Default)]
pub struct PublicationRegistry {
    specs: BTreeMap<String, PublicationSpec>,
}

impl PublicationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spec under its name, replacing any previous definition.
    pub fn register(&mut self, spec: PublicationSpec) {
        self.specs.insert(spec.name.clone(), spec);
    }

    /// Look up a spec by name.
    pub fn get(&self, name: &str) -> Result<&PublicationSpec, ConfigError> {
        self.specs
            .get(name)
            .ok_or_else(|| ConfigError::UnknownPublication {
                name: name.to_string(),
            })
    }

    /// All registered specs in name order.
    pub fn specs(&self) -> impl Iterator<Item = &PublicationSpec> {
        self.specs.values()
    }

    /// Number of registered specs.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Publisher behavior toggles, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherOptions {
    /// Target repository key within the repository manager.
    #[serde(default = "default_repo_key")]
    pub repo_key: String,
    /// Capture process environment into build-info properties.
    #[serde(default)]
    pub include_env_vars: bool,
    /// Upload module artifacts.
    #[serde(default = "default_true")]
    pub publish_artifacts: bool,
    /// Upload generated POM descriptors.
    #[serde(default)]
    pub publish_pom: bool,
    /// Upload generated Ivy descriptors.
    #[serde(default)]
    pub publish_ivy: bool,
    /// Allow re-publishing an existing (name, number) pair.
    #[serde(default)]
    pub overwrite: bool,
    /// Permit missing password (anonymous repository).
    #[serde(default)]
    pub anonymous: bool,
    /// Bound on concurrent artifact uploads per module.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Backoff policy for transient upload failures.
    #[serde(default)]
    pub retry: BackoffConfig,
}

fn default_repo_key() -> String {
    "libs-release-local".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_workers() -> usize {
    3
}

impl Default for PublisherOptions {
    fn default() -> Self {
        Self {
            repo_key: default_repo_key(),
            include_env_vars: false,
            publish_artifacts: true,
            publish_pom: false,
            publish_ivy: false,
            overwrite: false,
            anonymous: false,
            max_workers: default_max_workers(),
            retry: BackoffConfig::default(),
        }
    }
}

impl PublisherOptions {
    /// Load options from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read options file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse options file {}", path.display()))
    }

    /// Overlay flag values from a configuration source.
    ///
    /// Recognized keys: `repo_key`, `include_env_vars`, `publish_artifacts`,
    /// `publish_pom`, `publish_ivy`, `overwrite`, `anonymous`. Unrecognized
    /// keys in the source are ignored; absent keys leave the field alone.
    pub fn overlay(&mut self, source: &dyn ConfigSource) {
        if let Some(v) = source.get("repo_key") {
            self.repo_key = v;
        }
        overlay_flag(source, "include_env_vars", &mut self.include_env_vars);
        overlay_flag(source, "publish_artifacts", &mut self.publish_artifacts);
        overlay_flag(source, "publish_pom", &mut self.publish_pom);
        overlay_flag(source, "publish_ivy", &mut self.publish_ivy);
        overlay_flag(source, "overwrite", &mut self.overwrite);
        overlay_flag(source, "anonymous", &mut self.anonymous);
    }
}

fn overlay_flag(source: &dyn ConfigSource, key: &str, target: &mut bool) {
    if let Some(v) = source.get(key) {
        *target = matches!(v.as_str(), "true" | "1" | "yes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn full_source() -> MapSource {
        let mut source = MapSource::new("test");
        source
            .set("url", "https://repo.example.com/artifactory/")
            .set("username", "deployer")
            .set("password", "s3cret");
        source
    }

    #[test]
    fn resolve_takes_all_fields_from_one_source() {
        let source = full_source();
        let creds = resolve_credentials(&[&source], false).unwrap();
        assert_eq!(creds.base_url, "https://repo.example.com/artifactory");
        assert_eq!(creds.username, "deployer");
        assert_eq!(creds.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn later_sources_override_per_field() {
        let base = full_source();
        let mut override_source = MapSource::new("override");
        override_source.set("username", "ci-bot");

        let creds = resolve_credentials(&[&base, &override_source], false).unwrap();
        assert_eq!(creds.username, "ci-bot");
        // Untouched fields keep the earlier source's values.
        assert_eq!(creds.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn missing_url_is_an_error() {
        let mut source = MapSource::new("test");
        source.set("username", "deployer").set("password", "x");
        let err = resolve_credentials(&[&source], false).unwrap_err();
        assert_eq!(err, ConfigError::MissingCredential { field: "url" });
    }

    #[test]
    fn missing_password_rejected_unless_anonymous() {
        let mut source = MapSource::new("test");
        source
            .set("url", "https://example/repo")
            .set("username", "deployer");

        let err = resolve_credentials(&[&source], false).unwrap_err();
        assert_eq!(err, ConfigError::MissingCredential { field: "password" });

        let creds = resolve_credentials(&[&source], true).unwrap();
        assert_eq!(creds.password, None);
    }

    #[test]
    fn debug_output_redacts_password() {
        let creds = Credentials {
            base_url: "https://example/repo".to_string(),
            username: "deployer".to_string(),
            password: Some("s3cret".to_string()),
        };
        let debug = format!("{creds:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn env_source_reads_prefixed_variables() {
        temp_env::with_var("BI_CONFIG_TEST_URL", Some("https://env.example/repo"), || {
            let source = EnvSource::with_prefix("BI_CONFIG_TEST");
            assert_eq!(
                source.get("url").as_deref(),
                Some("https://env.example/repo")
            );
            assert_eq!(source.get("username"), None);
        });
    }

    #[test]
    fn file_source_loads_toml_properties() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "url = \"https://file.example/repo\"").unwrap();
        writeln!(file, "username = \"from-file\"").unwrap();

        let source = FileSource::load(file.path()).unwrap();
        assert_eq!(source.get("username").as_deref(), Some("from-file"));
        assert_eq!(source.get("password"), None);
    }

    #[test]
    fn registry_get_unknown_name_errors() {
        let registry = PublicationRegistry::new();
        let err = registry.get("mavenJava").unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownPublication {
                name: "mavenJava".to_string()
            }
        );
    }

    #[test]
    fn registry_register_then_get() {
        let mut registry = PublicationRegistry::new();
        let options = PublisherOptions {
            publish_pom: true,
            ..Default::default()
        };
        registry.register(PublicationSpec::from_options("mavenJava", &options));

        let spec = registry.get("mavenJava").unwrap();
        assert!(spec.publishes(ArtifactKind::Main));
        assert!(spec.publishes(ArtifactKind::Pom));
        assert!(!spec.publishes(ArtifactKind::Ivy));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn options_defaults() {
        let options = PublisherOptions::default();
        assert_eq!(options.repo_key, "libs-release-local");
        assert!(options.publish_artifacts);
        assert!(!options.publish_pom);
        assert!(!options.include_env_vars);
        assert!(!options.overwrite);
        assert_eq!(options.max_workers, 3);
    }

    #[test]
    fn options_overlay_reads_flags() {
        let mut source = MapSource::new("env");
        source
            .set("repo_key", "libs-snapshot-local")
            .set("include_env_vars", "true")
            .set("publish_artifacts", "0");

        let mut options = PublisherOptions::default();
        options.overlay(&source);
        assert_eq!(options.repo_key, "libs-snapshot-local");
        assert!(options.include_env_vars);
        assert!(!options.publish_artifacts);
        // Keys absent from the source keep their defaults.
        assert!(!options.overwrite);
    }

    #[test]
    fn options_load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "repo_key = \"gradle-local\"").unwrap();
        writeln!(file, "publish_ivy = true").unwrap();
        writeln!(file, "[retry]").unwrap();
        writeln!(file, "max_attempts = 5").unwrap();

        let options = PublisherOptions::load(file.path()).unwrap();
        assert_eq!(options.repo_key, "gradle-local");
        assert!(options.publish_ivy);
        assert_eq!(options.retry.max_attempts, 5);
        // Unspecified fields fall back to defaults.
        assert!(options.publish_artifacts);
    }
}
