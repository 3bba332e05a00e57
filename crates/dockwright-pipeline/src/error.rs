use dockwright_build::{BuildError, PublishError, WorkspaceError};
use dockwright_core::{CoreError, Stage};
use std::time::Duration;
use thiserror::Error;

/// Failure of one pipeline stage; terminal for the request
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("{stage} stage timed out after {}s", after.as_secs())]
    TimedOut { stage: Stage, after: Duration },

    #[error("{stage} stage cancelled")]
    Cancelled { stage: Stage },
}

impl StageError {
    /// Failure text for the outbound event, with hints where one helps
    pub fn user_message(&self) -> String {
        match self {
            StageError::Build(e) => e.user_message(),
            StageError::Publish(e) => e.user_message(),
            _ => self.to_string(),
        }
    }

    /// Whether the versioned image reached the registry despite the failure
    pub fn primary_published(&self) -> bool {
        matches!(self, StageError::Publish(e) if e.primary_published())
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Event channel closed")]
    Closed,
}

/// Failure of the controller itself, as opposed to a stage
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to publish event: {0}")]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Transition(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
