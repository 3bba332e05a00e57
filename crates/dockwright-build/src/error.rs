use std::path::PathBuf;
use thiserror::Error;

/// Failure of a git invocation
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Git executable not found in $PATH")]
    NotFound,

    /// Non-zero exit, carrying the trimmed combined output
    #[error("{0}")]
    Failed(String),

    #[error("Failed to run git: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Invalid repository or branch name: {0}")]
    InvalidName(String),

    #[error("Failed to write deploy key {path}: {source}")]
    KeyWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Clone failed: {0}")]
    Clone(#[source] GitError),

    #[error("Checkout failed: {0}")]
    Checkout(#[source] GitError),

    #[error("Pull failed: {0}")]
    Pull(#[source] GitError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("git archive failed: {0}")]
    Archive(String),

    #[error("{dockerfile} not found at commit {commit}")]
    DockerfileNotFound { dockerfile: String, commit: String },

    #[error("Required artifact '{0}' is missing from the release event")]
    MissingArtifact(String),

    #[error("Invalid image reference: {0}")]
    InvalidReference(String),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Unsupported docker endpoint: {0}")]
    UnsupportedEndpoint(String),

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Operator-facing message with a hint where one helps
    pub fn user_message(&self) -> String {
        match self {
            BuildError::Archive(msg) => format!(
                "Could not archive the requested commit: {}\n\
                 \n\
                 Check that the commit exists on the fetched branch.",
                msg
            ),
            BuildError::DockerfileNotFound { dockerfile, commit } => format!(
                "{} is missing from commit {}.\n\
                 \n\
                 Commit a Dockerfile at the repository root or set `dockerfile` in the config.",
                dockerfile, commit
            ),
            BuildError::BuildFailed(msg) => format!(
                "Image build failed: {}\n\
                 \n\
                 See the attached build log for the failing step.",
                msg
            ),
            _ => self.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Required artifact '{0}' is missing from the release event")]
    MissingArtifact(String),

    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    #[error("Push of {reference} failed: {message}")]
    Push { reference: String, message: String },

    #[error("Tagging {source_ref} as {target} failed: {message}")]
    Tag {
        source_ref: String,
        target: String,
        message: String,
    },

    #[error("Push of alias {reference} failed: {message}")]
    AliasPush { reference: String, message: String },
}

impl PublishError {
    /// Whether the new version itself reached the registry
    pub fn primary_published(&self) -> bool {
        matches!(self, PublishError::Tag { .. } | PublishError::AliasPush { .. })
    }

    pub fn user_message(&self) -> String {
        match self {
            PublishError::Push { reference, message } => format!(
                "New version {} is unavailable: {}",
                reference, message
            ),
            PublishError::Tag { target, .. } | PublishError::AliasPush { reference: target, .. } => {
                format!(
                    "{}\n\
                     \n\
                     The versioned image was pushed, but alias {} is stale.",
                    self, target
                )
            }
            _ => self.to_string(),
        }
    }
}

pub type WorkspaceResult<T> = std::result::Result<T, WorkspaceError>;
pub type BuildResult<T> = std::result::Result<T, BuildError>;
pub type PublishResult<T> = std::result::Result<T, PublishError>;
