use crate::state::PipelineState;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Required artifact '{0}' is missing from the release event")]
    MissingArtifact(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: PipelineState,
        to: PipelineState,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;
