//! Build-info assembly.
//!
//! Merges collected modules, captured environment properties, and run
//! metadata into one immutable [`BuildInfo`] document. Assembly is
//! deterministic for identical inputs: properties live in a `BTreeMap` and
//! module order is whatever the collector produced.

use std::collections::BTreeMap;

use buildinfo_config::ConfigError;
use buildinfo_types::{Agent, BUILD_INFO_VERSION, BuildInfo, Module};
use chrono::{DateTime, Utc};

use crate::error::PublishError;

/// Prefix for environment properties captured into the document.
pub const ENV_PROPERTY_PREFIX: &str = "buildInfo.env.";

/// Variable-name fragments that must never reach the document.
const SENSITIVE_MARKERS: &[&str] = &["password", "secret", "token", "key"];

/// Run metadata supplied by the caller.
#[derive(Debug, Clone)]
pub struct BuildMetadata {
    /// Build name.
    pub name: String,
    /// Build number.
    pub number: String,
    /// When the build started.
    pub started: DateTime<Utc>,
    /// Wall-clock duration of the build in milliseconds.
    pub duration_millis: u64,
    /// Optional promotion status.
    pub status: Option<String>,
}

/// Source of environment variables.
///
/// Injected rather than read from globals so tests can substitute a fixed
/// snapshot.
pub trait EnvProvider {
    /// All variables visible to the build.
    fn vars(&self) -> Vec<(String, String)>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvProvider for ProcessEnv {
    fn vars(&self) -> Vec<(String, String)> {
        std::env::vars().collect()
    }
}

/// Assemble the build-info document.
///
/// Environment properties are captured only when `include_env_vars` is set,
/// filtered against the sensitive-name denylist, and prefixed with
/// [`ENV_PROPERTY_PREFIX`]. Empty name or number is rejected before any
/// further work.
pub fn assemble(
    modules: Vec<Module>,
    metadata: &BuildMetadata,
    env: &dyn EnvProvider,
    include_env_vars: bool,
) -> Result<BuildInfo, PublishError> {
    if metadata.name.is_empty() {
        return Err(ConfigError::InvalidMetadata {
            reason: "build name is empty".to_string(),
        }
        .into());
    }
    if metadata.number.is_empty() {
        return Err(ConfigError::InvalidMetadata {
            reason: "build number is empty".to_string(),
        }
        .into());
    }

    let mut properties = BTreeMap::new();
    if include_env_vars {
        for (key, value) in env.vars() {
            if is_sensitive(&key) {
                continue;
            }
            properties.insert(format!("{ENV_PROPERTY_PREFIX}{key}"), value);
        }
    }

    Ok(BuildInfo {
        version: BUILD_INFO_VERSION.to_string(),
        name: metadata.name.clone(),
        number: metadata.number.clone(),
        started: metadata.started,
        duration_millis: metadata.duration_millis,
        status: metadata.status.clone(),
        agent: Some(Agent {
            name: "buildinfo".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
        properties,
        modules,
    })
}

fn is_sensitive(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticEnv(Vec<(String, String)>);

    impl EnvProvider for StaticEnv {
        fn vars(&self) -> Vec<(String, String)> {
            self.0.clone()
        }
    }

    fn metadata() -> BuildMetadata {
        BuildMetadata {
            name: "demo".to_string(),
            number: "7".to_string(),
            started: "2026-01-05T10:00:00Z".parse().unwrap(),
            duration_millis: 1500,
            status: None,
        }
    }

    #[test]
    fn captures_env_vars_when_enabled() {
        let env = StaticEnv(vec![("CI".to_string(), "true".to_string())]);
        let build = assemble(Vec::new(), &metadata(), &env, true).unwrap();
        assert_eq!(
            build.properties.get("buildInfo.env.CI").map(String::as_str),
            Some("true")
        );
    }

    #[test]
    fn env_vars_excluded_when_disabled() {
        let env = StaticEnv(vec![("CI".to_string(), "true".to_string())]);
        let build = assemble(Vec::new(), &metadata(), &env, false).unwrap();
        assert!(build.properties.is_empty());
    }

    #[test]
    fn sensitive_variables_never_reach_the_document() {
        let env = StaticEnv(vec![
            ("DEPLOY_PASSWORD".to_string(), "hunter2".to_string()),
            ("API_TOKEN".to_string(), "abc".to_string()),
            ("SSH_KEY_PATH".to_string(), "/home/ci/.ssh/id".to_string()),
            ("BRANCH".to_string(), "main".to_string()),
        ]);
        let build = assemble(Vec::new(), &metadata(), &env, true).unwrap();
        assert_eq!(build.properties.len(), 1);
        assert!(build.properties.contains_key("buildInfo.env.BRANCH"));
    }

    #[test]
    fn empty_name_is_invalid_metadata() {
        let mut md = metadata();
        md.name = String::new();
        let err = assemble(Vec::new(), &md, &ProcessEnv, false).unwrap_err();
        assert!(matches!(
            err,
            PublishError::Configuration(ConfigError::InvalidMetadata { .. })
        ));
    }

    #[test]
    fn empty_number_is_invalid_metadata() {
        let mut md = metadata();
        md.number = String::new();
        let err = assemble(Vec::new(), &md, &ProcessEnv, false).unwrap_err();
        assert!(matches!(
            err,
            PublishError::Configuration(ConfigError::InvalidMetadata { .. })
        ));
    }

    #[test]
    fn assembly_is_deterministic_byte_for_byte() {
        let env = StaticEnv(vec![
            ("B".to_string(), "2".to_string()),
            ("A".to_string(), "1".to_string()),
        ]);
        let a = assemble(Vec::new(), &metadata(), &env, true).unwrap();
        let b = assemble(Vec::new(), &metadata(), &env, true).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn document_carries_format_version_and_agent() {
        let build = assemble(Vec::new(), &metadata(), &ProcessEnv, false).unwrap();
        assert_eq!(build.version, BUILD_INFO_VERSION);
        let agent = build.agent.expect("agent");
        assert_eq!(agent.name, "buildinfo");
    }
}
