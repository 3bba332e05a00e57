//! Stage seams
//!
//! The controller drives the three stages through these traits; the default
//! implementations are the git workspace manager, the Docker image builder
//! and the registry pusher.

use dockwright_build::{
    BuildLog, BuildResult, ImageBuilder, ImagePusher, ImageReference, PublishResult,
    RegistryClient, RegistryCredentials, WorkspaceManager, WorkspaceResult,
};
use dockwright_core::ReleaseRequest;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Bring the workspace for a request up to its branch tip
#[allow(async_fn_in_trait)]
pub trait FetchStage {
    async fn fetch(&self, request: &ReleaseRequest) -> WorkspaceResult<PathBuf>;
}

/// Build the requested commit as `image`
#[allow(async_fn_in_trait)]
pub trait BuildStage {
    async fn build(
        &self,
        request: &ReleaseRequest,
        workspace: &Path,
        image: &ImageReference,
        log: &BuildLog,
    ) -> BuildResult<()>;
}

/// Publish `image` under both policy tags
#[allow(async_fn_in_trait)]
pub trait PublishStage {
    async fn publish(
        &self,
        image: &ImageReference,
        credentials: &RegistryCredentials,
        log: &BuildLog,
    ) -> PublishResult<()>;
}

impl FetchStage for WorkspaceManager {
    async fn fetch(&self, request: &ReleaseRequest) -> WorkspaceResult<PathBuf> {
        let workspace = self
            .ensure(
                &request.repository,
                &request.git_url,
                &request.branch,
                &request.ssh_private_key,
            )
            .await?;
        Ok(workspace.path)
    }
}

impl BuildStage for ImageBuilder {
    async fn build(
        &self,
        request: &ReleaseRequest,
        workspace: &Path,
        image: &ImageReference,
        log: &BuildLog,
    ) -> BuildResult<()> {
        self.build_release(workspace, &request.commit, image, build_args(request), log)
            .await
    }
}

impl<R: RegistryClient> PublishStage for ImagePusher<R> {
    async fn publish(
        &self,
        image: &ImageReference,
        credentials: &RegistryCredentials,
        log: &BuildLog,
    ) -> PublishResult<()> {
        ImagePusher::<R>::publish(self, image, credentials, log).await
    }
}

/// Build-usage secrets as build arguments; a repeated key keeps its last value
pub fn build_args(request: &ReleaseRequest) -> HashMap<String, String> {
    request
        .build_secrets()
        .map(|secret| (secret.key.clone(), secret.value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockwright_core::{Artifacts, Secret, SecretString, SecretUsage};

    #[test]
    fn test_only_build_secrets_become_build_args() {
        let request = ReleaseRequest {
            id: "rel-1".to_string(),
            repository: "acme/app".to_string(),
            git_url: "git@example.com:acme/app.git".to_string(),
            branch: "main".to_string(),
            commit: "deadbeef".to_string(),
            environment: "production".to_string(),
            secrets: vec![
                Secret::new("NPM_TOKEN", "t1", SecretUsage::Build),
                Secret::new("DATABASE_URL", "postgres://", SecretUsage::Env),
                Secret::new("TLS_CERT", "pem", SecretUsage::File),
                Secret::new("NPM_TOKEN", "t2", SecretUsage::Build),
            ],
            ssh_private_key: SecretString::new("key"),
            artifacts: Artifacts::new(),
        };

        let args = build_args(&request);
        assert_eq!(args.len(), 1);
        assert_eq!(args.get("NPM_TOKEN").map(String::as_str), Some("t2"));
    }
}
