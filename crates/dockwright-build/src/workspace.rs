//! Workspace checkout
//!
//! Keeps one checkout per `(repository, branch)` under the workdir root and
//! brings it to the branch tip on every request. Checkouts are never removed;
//! they are a cache that outlives requests.

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::git::Git;
use dockwright_config::{GitIdentity, KeyScope, PipelineConfig};
use dockwright_core::{SecretString, WorkspaceKey};
use std::ffi::OsStr;
use std::io::Write as _;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// An up-to-date checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub key: WorkspaceKey,
    pub path: PathBuf,
    /// Whether this call created the checkout
    pub cloned: bool,
}

/// Materializes deploy keys and workspace checkouts
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    key_scope: KeyScope,
    identity: GitIdentity,
}

/// Deploy key on disk; a request-scoped key is deleted on drop
enum DeployKey {
    Persistent(PathBuf),
    Temporary(tempfile::NamedTempFile),
}

impl DeployKey {
    fn path(&self) -> &Path {
        match self {
            DeployKey::Persistent(path) => path,
            DeployKey::Temporary(file) => file.path(),
        }
    }
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            key_scope: KeyScope::default(),
            identity: GitIdentity::default(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.workdir)
            .with_key_scope(config.key_scope)
            .with_identity(config.git.clone())
    }

    pub fn with_key_scope(mut self, key_scope: KeyScope) -> Self {
        self.key_scope = key_scope;
        self
    }

    pub fn with_identity(mut self, identity: GitIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<repository>_<branch>`
    pub fn workspace_path(&self, repository: &str, branch: &str) -> PathBuf {
        self.root.join(workspace_key(repository, branch).slot())
    }

    /// `<root>/<repository>_id_rsa`
    pub fn key_path(&self, repository: &str) -> PathBuf {
        self.root.join(format!("{}{}", repository, KEY_SUFFIX))
    }

    /// Ensure a checkout of `branch` at its current tip exists
    ///
    /// Clones on first use, then always checks out the branch and pulls from
    /// origin, so a stale cache heals itself.
    pub async fn ensure(
        &self,
        repository: &str,
        git_url: &str,
        branch: &str,
        ssh_key: &SecretString,
    ) -> WorkspaceResult<Workspace> {
        validate_name(repository)?;
        validate_name(branch)?;
        let key = workspace_key(repository, branch);
        if key.slot().ends_with(KEY_SUFFIX) {
            // Would share a path with a deploy key
            return Err(WorkspaceError::InvalidName(branch.to_string()));
        }

        let repo_path = self.workspace_path(repository, branch);
        if let Some(parent) = repo_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let deploy_key = self.materialize_key(repository, ssh_key).await?;
        let git = self.git_env(deploy_key.path());

        let mut cloned = false;
        if !fs::try_exists(&repo_path).await? {
            tracing::info!(path = %repo_path.display(), "cloning repository");
            self.clone_into(&git, git_url, &repo_path).await?;
            cloned = true;
        }

        git.run([
            OsStr::new("-C"),
            repo_path.as_os_str(),
            OsStr::new("checkout"),
            OsStr::new(branch),
        ])
        .await
        .map_err(WorkspaceError::Checkout)?;

        git.run([
            OsStr::new("-C"),
            repo_path.as_os_str(),
            OsStr::new("pull"),
            OsStr::new("origin"),
            OsStr::new(branch),
        ])
        .await
        .map_err(WorkspaceError::Pull)?;

        drop(deploy_key);

        Ok(Workspace {
            key,
            path: repo_path,
            cloned,
        })
    }

    /// Clone into a staging directory next to `repo_path` and move it into
    /// place once complete
    ///
    /// A clone killed part-way (timeout, cancellation) leaves only the staging
    /// directory, which is removed on drop, so the next request clones again.
    async fn clone_into(
        &self,
        git: &Git,
        git_url: &str,
        repo_path: &Path,
    ) -> WorkspaceResult<()> {
        let parent = repo_path.parent().unwrap_or(&self.root);
        let staging = tempfile::Builder::new()
            .prefix(".clone-")
            .tempdir_in(parent)?;
        let target = staging.path().join("checkout");

        git.run([OsStr::new("clone"), OsStr::new(git_url), target.as_os_str()])
            .await
            .map_err(WorkspaceError::Clone)?;
        fs::rename(&target, repo_path).await?;
        Ok(())
    }

    fn git_env(&self, key_path: &Path) -> Git {
        let ssh_command = format!(
            "ssh -o UserKnownHostsFile=/dev/null -o StrictHostKeyChecking=no -i '{}' -F /dev/null",
            key_path.display()
        );
        Git::new()
            .env("GIT_SSH_COMMAND", ssh_command)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_AUTHOR_NAME", &self.identity.user_name)
            .env("GIT_AUTHOR_EMAIL", &self.identity.user_email)
            .env("GIT_COMMITTER_NAME", &self.identity.user_name)
            .env("GIT_COMMITTER_EMAIL", &self.identity.user_email)
    }

    async fn materialize_key(
        &self,
        repository: &str,
        ssh_key: &SecretString,
    ) -> WorkspaceResult<DeployKey> {
        match self.key_scope {
            KeyScope::Repository => {
                let path = self.key_path(repository);
                if !fs::try_exists(&path).await? {
                    tracing::info!(path = %path.display(), "creating repository deploy key");
                    write_key(&path, ssh_key)
                        .await
                        .map_err(|source| WorkspaceError::KeyWrite {
                            path: path.clone(),
                            source,
                        })?;
                }
                Ok(DeployKey::Persistent(path))
            }
            KeyScope::Request => {
                fs::create_dir_all(&self.root).await?;
                let file = write_temporary_key(&self.root, ssh_key).map_err(|source| {
                    WorkspaceError::KeyWrite {
                        path: self.root.clone(),
                        source,
                    }
                })?;
                tracing::debug!(path = %file.path().display(), "created request deploy key");
                Ok(DeployKey::Temporary(file))
            }
        }
    }
}

const KEY_SUFFIX: &str = "_id_rsa";

fn workspace_key(repository: &str, branch: &str) -> WorkspaceKey {
    WorkspaceKey {
        repository: repository.to_string(),
        branch: branch.to_string(),
    }
}

/// ssh rejects OpenSSH keys without a trailing newline
fn key_bytes(ssh_key: &SecretString) -> Vec<u8> {
    let mut bytes = ssh_key.expose().as_bytes().to_vec();
    if !bytes.ends_with(b"\n") {
        bytes.push(b'\n');
    }
    bytes
}

async fn write_key(path: &Path, ssh_key: &SecretString) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    file.write_all(&key_bytes(ssh_key)).await?;
    file.sync_all().await?;
    Ok(())
}

/// Temporary files are created owner-only
fn write_temporary_key(
    dir: &Path,
    ssh_key: &SecretString,
) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(".deploy-key-")
        .tempfile_in(dir)?;
    file.write_all(&key_bytes(ssh_key))?;
    file.as_file().sync_all()?;
    Ok(file)
}

/// Names become path components under the root; reject anything that escapes it
fn validate_name(name: &str) -> WorkspaceResult<()> {
    let path = Path::new(name);
    let escapes = name.is_empty()
        || name.starts_with('-')
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(WorkspaceError::InvalidName(name.to_string()));
    }
    Ok(())
}
