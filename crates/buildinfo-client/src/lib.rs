//! Repository manager HTTP client.
//!
//! Deploys artifact bytes with `PUT {base}/{repo}/{path};k=v;...` (matrix
//! parameters carry the build-identifying properties), uploads the
//! build-info document to the `/api/build` endpoint, and answers
//! build-existence queries for the duplicate-publish guard.
//!
//! Every failure is classified so the publish engine's retry layer can
//! decide whether another attempt makes sense: connect failures and 5xx
//! responses are retryable, errors after the request may have gone out
//! (timeouts, resets) are ambiguous, and 4xx responses are permanent.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use buildinfo_config::Credentials;
use buildinfo_types::{BuildInfo, ErrorClass};

/// Default timeout for repository requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("buildinfo/", env!("CARGO_PKG_VERSION"));

/// Content type the repository manager expects for build-info documents.
pub const BUILD_INFO_CONTENT_TYPE: &str = "application/vnd.org.jfrog.artifactory+json";

const BUILD_ENDPOINT: &str = "/api/build";

/// A repository interaction failed.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never got a response (DNS, connect, timeout, reset).
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The repository answered with a non-success status.
    #[error("{action} rejected with HTTP {status} for {url}")]
    Status {
        /// What was being attempted (`deploy`, `build-info upload`, ...).
        action: &'static str,
        status: u16,
        url: String,
    },
    /// The local artifact file could not be read.
    #[error("failed to read artifact file {path}: {source}")]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The build-info document could not be serialized.
    #[error("failed to serialize build-info document: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    /// Classify this error for the retry layer.
    ///
    /// Connect failures never reached the server and are retryable; network
    /// errors after the request may have gone out (timeouts, resets) are
    /// ambiguous, since the upload may have landed. 401/403/404 and other
    /// 4xx responses are permanent, as are local file errors.
    pub fn class(&self) -> ErrorClass {
        match self {
            ClientError::Network { source, .. } => {
                if source.is_connect() {
                    ErrorClass::Retryable
                } else {
                    ErrorClass::Ambiguous
                }
            }
            ClientError::Status { status, .. } => {
                if *status >= 500 {
                    ErrorClass::Retryable
                } else {
                    ErrorClass::Permanent
                }
            }
            ClientError::LocalFile { .. } => ErrorClass::Permanent,
            ClientError::Serialize { .. } => ErrorClass::Permanent,
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Deployments are idempotent PUTs to fixed paths, so an ambiguous
    /// outcome is safe to retry.
    pub fn is_retryable(&self) -> bool {
        self.class() != ErrorClass::Permanent
    }
}

/// Everything needed to deploy one file.
#[derive(Debug, Clone)]
pub struct DeployDetails {
    /// Target repository key.
    pub repo_key: String,
    /// Repository-relative artifact path.
    pub artifact_path: String,
    /// Local file to upload.
    pub file: PathBuf,
    /// Hex SHA-1 of the file, sent as `X-Checksum-Sha1`.
    pub sha1: String,
    /// Hex MD5 of the file, sent as `X-Checksum-Md5`.
    pub md5: String,
    /// Properties attached to the deployed file as matrix parameters.
    pub properties: BTreeMap<String, String>,
}

/// Blocking client for one repository manager.
///
/// Cheap to clone; the underlying connection pool is shared between clones,
/// which is how the publish engine hands it to upload workers.
#[derive(Debug, Clone)]
pub struct RepositoryClient {
    base_url: String,
    username: String,
    password: Option<String>,
    client: reqwest::blocking::Client,
}

impl RepositoryClient {
    /// Create a client from resolved credentials.
    pub fn new(credentials: &Credentials) -> Self {
        Self::with_timeout(credentials, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client with an explicit request timeout.
    pub fn with_timeout(credentials: &Credentials, timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self {
            base_url: credentials.base_url.trim_end_matches('/').to_string(),
            username: credentials.username.clone(),
            password: credentials.password.clone(),
            client,
        }
    }

    /// The repository base URL (no trailing slash).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Deploy one artifact file.
    ///
    /// Re-deploying to the same path overwrites remote content
    /// (last-write-wins), which is what makes publishing idempotent under
    /// the overwrite policy.
    pub fn deploy_artifact(&self, details: &DeployDetails) -> Result<(), ClientError> {
        let url = self.deploy_url(details);
        let body = std::fs::read(&details.file).map_err(|source| ClientError::LocalFile {
            path: details.file.clone(),
            source,
        })?;

        let response = self
            .client
            .put(&url)
            .basic_auth(&self.username, self.password.as_deref())
            .header("X-Checksum-Sha1", &details.sha1)
            .header("X-Checksum-Md5", &details.md5)
            .body(body)
            .send()
            .map_err(|source| ClientError::Network {
                url: url.clone(),
                source,
            })?;

        expect_success("deploy", &url, response.status())
    }

    /// Deploy in-memory bytes (generated descriptors) to a repository path.
    pub fn deploy_bytes(
        &self,
        repo_key: &str,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ClientError> {
        let url = format!(
            "{}/{}/{}",
            self.base_url,
            repo_key,
            path.trim_start_matches('/')
        );
        let response = self
            .client
            .put(&url)
            .basic_auth(&self.username, self.password.as_deref())
            .body(bytes)
            .send()
            .map_err(|source| ClientError::Network {
                url: url.clone(),
                source,
            })?;

        expect_success("descriptor deploy", &url, response.status())
    }

    /// Upload the serialized build-info document.
    ///
    /// The repository answers 204 No Content on success; any 2xx is
    /// accepted to tolerate repository-manager variants.
    pub fn put_build_info(&self, build_info: &BuildInfo) -> Result<(), ClientError> {
        let url = format!("{}{}", self.base_url, BUILD_ENDPOINT);
        let body = serde_json::to_vec(build_info)
            .map_err(|source| ClientError::Serialize { source })?;

        let response = self
            .client
            .put(&url)
            .basic_auth(&self.username, self.password.as_deref())
            .header(reqwest::header::CONTENT_TYPE, BUILD_INFO_CONTENT_TYPE)
            .body(body)
            .send()
            .map_err(|source| ClientError::Network {
                url: url.clone(),
                source,
            })?;

        expect_success("build-info upload", &url, response.status())
    }

    /// Whether a build with this (name, number) pair is already published.
    pub fn build_exists(&self, name: &str, number: &str) -> Result<bool, ClientError> {
        let url = format!("{}{}/{}/{}", self.base_url, BUILD_ENDPOINT, name, number);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, self.password.as_deref())
            .send()
            .map_err(|source| ClientError::Network {
                url: url.clone(),
                source,
            })?;

        match response.status() {
            reqwest::StatusCode::OK => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status => Err(ClientError::Status {
                action: "build lookup",
                status: status.as_u16(),
                url,
            }),
        }
    }

    fn deploy_url(&self, details: &DeployDetails) -> String {
        format!(
            "{}/{}/{}{}",
            self.base_url,
            details.repo_key,
            details.artifact_path.trim_start_matches('/'),
            matrix_suffix(&details.properties)
        )
    }
}

fn expect_success(
    action: &'static str,
    url: &str,
    status: reqwest::StatusCode,
) -> Result<(), ClientError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(ClientError::Status {
            action,
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}

/// Render properties as matrix parameters: `;key=value;key2=value2`.
///
/// Keys are already restricted to property-name characters; values are
/// percent-encoded. BTreeMap iteration keeps the suffix deterministic.
pub fn matrix_suffix(properties: &BTreeMap<String, String>) -> String {
    let mut suffix = String::new();
    for (key, value) in properties {
        suffix.push(';');
        suffix.push_str(key);
        suffix.push('=');
        suffix.push_str(&percent_encode(value));
    }
    suffix
}

/// Percent-encode a matrix parameter value.
fn percent_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    encoded
}
