//! Event artifacts
//!
//! Named key/value pairs attached to events. Values flagged secret are
//! redacted from `Debug` output so they can't leak through tracing fields.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// Well-known artifact keys
pub mod keys {
    pub const USER: &str = "user";
    pub const PASSWORD: &str = "password";
    pub const EMAIL: &str = "email";
    pub const HOST: &str = "host";
    pub const ORG: &str = "org";
    pub const IMAGE: &str = "image";
    pub const BUILD_LOG: &str = "build_log";

    /// Credential artifacts re-attached to the completion event
    pub const CREDENTIALS: [&str; 4] = [USER, PASSWORD, EMAIL, HOST];
}

/// A named, optionally secret value
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub secret: bool,
}

impl Artifact {
    pub fn new(key: impl Into<String>, value: impl Into<String>, secret: bool) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            secret,
        }
    }

    pub fn public(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, value, false)
    }

    pub fn secret(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, value, true)
    }
}

impl std::fmt::Debug for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value: &str = if self.secret { "[REDACTED]" } else { &self.value };
        f.debug_struct("Artifact")
            .field("key", &self.key)
            .field("value", &value)
            .field("secret", &self.secret)
            .finish()
    }
}

/// Ordered artifact set
///
/// Lookups return the first artifact with a matching key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Artifacts(Vec<Artifact>);

impl Artifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Artifact> {
        self.0.iter().find(|a| a.key == key)
    }

    /// Look up an artifact that must be present
    pub fn require(&self, key: &str) -> Result<&Artifact> {
        self.get(key)
            .ok_or_else(|| CoreError::MissingArtifact(key.to_string()))
    }

    pub fn push(&mut self, artifact: Artifact) {
        self.0.push(artifact);
    }

    pub fn with(mut self, artifact: Artifact) -> Self {
        self.push(artifact);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Artifact>> for Artifacts {
    fn from(artifacts: Vec<Artifact>) -> Self {
        Self(artifacts)
    }
}

impl FromIterator<Artifact> for Artifacts {
    fn from_iter<I: IntoIterator<Item = Artifact>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Artifacts {
    type Item = &'a Artifact;
    type IntoIter = std::slice::Iter<'a, Artifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_value_redacted_in_debug() {
        let artifact = Artifact::secret("password", "hunter2");
        let debug = format!("{:?}", artifact);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));

        let public = Artifact::public("host", "registry.example.com");
        assert!(format!("{:?}", public).contains("registry.example.com"));
    }

    #[test]
    fn test_require_missing() {
        let artifacts = Artifacts::new().with(Artifact::public("host", "registry"));
        assert_eq!(artifacts.require("host").unwrap().value, "registry");
        assert_eq!(
            artifacts.require("password"),
            Err(CoreError::MissingArtifact("password".to_string()))
        );
    }

    #[test]
    fn test_secret_flag_defaults_to_false() {
        let artifact: Artifact =
            serde_json::from_str(r#"{"key":"org","value":"acme"}"#).unwrap();
        assert!(!artifact.secret);
    }

    #[test]
    fn test_serializes_as_list() {
        let artifacts: Artifacts = vec![Artifact::secret("user", "a")].into();
        let json = serde_json::to_value(&artifacts).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"key": "user", "value": "a", "secret": true}])
        );
    }
}
