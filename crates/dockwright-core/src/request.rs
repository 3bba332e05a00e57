//! Inbound release request

use crate::artifact::Artifacts;
use serde::{Deserialize, Serialize};

/// How a secret is consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretUsage {
    /// Passed to the image build as a build argument
    Build,
    /// Runtime environment variable (not used by the build pipeline)
    Env,
    /// Runtime file (not used by the build pipeline)
    File,
}

/// A secret attached to a release
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub key: String,
    pub value: String,
    pub usage: SecretUsage,
    #[serde(default)]
    pub secret: bool,
}

impl Secret {
    pub fn new(key: impl Into<String>, value: impl Into<String>, usage: SecretUsage) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            usage,
            secret: true,
        }
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("key", &self.key)
            .field("value", &"[REDACTED]")
            .field("usage", &self.usage)
            .finish()
    }
}

/// String whose contents never show up in `Debug` or `Display`
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Key of the on-disk workspace cache
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceKey {
    pub repository: String,
    pub branch: String,
}

impl WorkspaceKey {
    /// On-disk checkout name, `<repository>_<branch>`
    ///
    /// Distinct keys can share a slot (`a_b`/`c` and `a`/`b_c`), so anything
    /// guarding the checkout must key on the slot.
    pub fn slot(&self) -> String {
        format!("{}_{}", self.repository, self.branch)
    }
}

impl std::fmt::Display for WorkspaceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.repository, self.branch)
    }
}

/// Request to build and publish an image for one commit
///
/// Immutable once received; every stage borrows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRequest {
    /// Release identifier, used as the subject of outbound events
    pub id: String,
    /// Repository identifier (e.g. `acme/app`)
    pub repository: String,
    /// Clone URL
    pub git_url: String,
    pub branch: String,
    /// Commit the image is built from
    pub commit: String,
    /// Target environment (e.g. `production`, `staging`)
    pub environment: String,
    #[serde(default)]
    pub secrets: Vec<Secret>,
    /// Deploy key used for repository access
    pub ssh_private_key: SecretString,
    /// Registry artifacts: `user`, `password`, `email`, `host`, `org`
    #[serde(default)]
    pub artifacts: Artifacts,
}

impl ReleaseRequest {
    /// Secrets passed to the image build, in request order
    pub fn build_secrets(&self) -> impl Iterator<Item = &Secret> {
        self.secrets
            .iter()
            .filter(|s| s.usage == SecretUsage::Build)
    }

    pub fn workspace_key(&self) -> WorkspaceKey {
        WorkspaceKey {
            repository: self.repository.clone(),
            branch: self.branch.clone(),
        }
    }
}
