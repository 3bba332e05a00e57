//! Counting stage doubles for controller tests

#![allow(dead_code)]

use dockwright_build::{
    BuildError, BuildLog, BuildResult, GitError, ImageReference, PublishError, PublishResult,
    RegistryCredentials, WorkspaceError, WorkspaceResult,
};
use dockwright_core::{Artifact, Artifacts, ReleaseRequest, Secret, SecretString, SecretUsage};
use dockwright_pipeline::{BuildStage, FetchStage, PublishStage};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BUILD_OUTPUT: &str = "Step 1/2 : FROM alpine\nStep 2/2 : RUN make\n";

pub fn release_request() -> ReleaseRequest {
    ReleaseRequest {
        id: "rel-42".to_string(),
        repository: "acme/app".to_string(),
        git_url: "git@example.com:acme/app.git".to_string(),
        branch: "main".to_string(),
        commit: "deadbeef".to_string(),
        environment: "production".to_string(),
        secrets: vec![Secret::new("NPM_TOKEN", "npm-secret", SecretUsage::Build)],
        ssh_private_key: SecretString::new("-----BEGIN KEY-----"),
        artifacts: Artifacts::from(vec![
            Artifact::public("user", "deployer"),
            Artifact::secret("password", "hunter2"),
            Artifact::public("email", "deployer@acme.test"),
            Artifact::secret("host", "registry"),
            Artifact::public("org", "acme"),
        ]),
    }
}

pub fn without_artifact(mut request: ReleaseRequest, key: &str) -> ReleaseRequest {
    request.artifacts = request
        .artifacts
        .iter()
        .filter(|a| a.key != key)
        .cloned()
        .collect();
    request
}

#[derive(Clone, Default)]
pub struct MockFetch {
    pub calls: Arc<AtomicUsize>,
    pub fail: bool,
    pub delay: Option<Duration>,
}

impl MockFetch {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FetchStage for MockFetch {
    async fn fetch(&self, request: &ReleaseRequest) -> WorkspaceResult<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(WorkspaceError::Clone(GitError::Failed(
                "Permission denied (publickey)".to_string(),
            )));
        }
        Ok(PathBuf::from("/tmp/workspaces").join(format!(
            "{}_{}",
            request.repository, request.branch
        )))
    }
}

#[derive(Clone, Default)]
pub struct MockBuild {
    pub calls: Arc<AtomicUsize>,
    pub fail: bool,
    pub images: Arc<Mutex<Vec<String>>>,
}

impl MockBuild {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn images(&self) -> Vec<String> {
        self.images.lock().unwrap().clone()
    }
}

impl BuildStage for MockBuild {
    async fn build(
        &self,
        _request: &ReleaseRequest,
        _workspace: &Path,
        image: &ImageReference,
        log: &BuildLog,
    ) -> BuildResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.images.lock().unwrap().push(image.primary());
        log.append(BUILD_OUTPUT.as_bytes());
        if self.fail {
            log.append_line("make: *** [all] Error 2");
            return Err(BuildError::BuildFailed(
                "The command '/bin/sh -c make' returned a non-zero code: 2".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MockPublish {
    pub calls: Arc<AtomicUsize>,
    pub fail: bool,
    pub fail_alias: bool,
    pub pushed: Arc<Mutex<Vec<String>>>,
    pub credentials: Arc<Mutex<Vec<RegistryCredentials>>>,
}

impl MockPublish {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn failing_alias() -> Self {
        Self {
            fail_alias: true,
            ..Default::default()
        }
    }

    pub fn pushed(&self) -> Vec<String> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn credentials(&self) -> Vec<RegistryCredentials> {
        self.credentials.lock().unwrap().clone()
    }
}

impl PublishStage for MockPublish {
    async fn publish(
        &self,
        image: &ImageReference,
        credentials: &RegistryCredentials,
        log: &BuildLog,
    ) -> PublishResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.credentials.lock().unwrap().push(credentials.clone());
        log.append_line(&format!("Pushing {}", image.repository_path()));
        if self.fail {
            return Err(PublishError::Push {
                reference: image.primary(),
                message: "unauthorized: authentication required".to_string(),
            });
        }
        let mut pushed = self.pushed.lock().unwrap();
        pushed.push(image.primary());
        if self.fail_alias {
            return Err(PublishError::AliasPush {
                reference: image.alias(),
                message: "denied: requested access to the resource is denied".to_string(),
            });
        }
        pushed.push(image.alias());
        Ok(())
    }
}

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git in `dir` with a throwaway identity, returning trimmed stdout
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args([
            "-c",
            "user.name=dockwright-test",
            "-c",
            "user.email=test@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Repository on branch `main` with one commit; returns its hash
pub fn init_remote(dir: &Path) -> String {
    git(dir, &["init", "-q"]);
    git(dir, &["checkout", "-q", "-b", "main"]);
    std::fs::write(dir.join("Dockerfile"), "FROM alpine\n").unwrap();
    git(dir, &["add", "Dockerfile"]);
    git(dir, &["commit", "-q", "-m", "initial"]);
    git(dir, &["rev-parse", "HEAD"])
}
