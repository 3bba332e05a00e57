//! Pipeline state machine
//!
//! `fetching -> building -> pushing -> complete`, with `failed` reachable
//! from every non-terminal state.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// State of an in-flight release request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Workspace is being cloned or updated
    Fetching,
    /// Build context is archived and the image is being built
    Building,
    /// Image is being tagged and pushed
    Pushing,
    /// Image published
    Complete,
    /// A stage failed
    Failed,
}

impl PipelineState {
    /// Initial state on receipt of a release request
    pub const INITIAL: PipelineState = PipelineState::Fetching;

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Complete | PipelineState::Failed)
    }

    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Fetching, Building) | (Building, Pushing) | (Pushing, Complete) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Validate and perform a transition
    pub fn transition(self, next: PipelineState) -> Result<PipelineState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Fetching => write!(f, "fetching"),
            PipelineState::Building => write!(f, "building"),
            PipelineState::Pushing => write!(f, "pushing"),
            PipelineState::Complete => write!(f, "complete"),
            PipelineState::Failed => write!(f, "failed"),
        }
    }
}

/// Pipeline stage, named in failure messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Build,
    Push,
}

impl Stage {
    /// State entered when this stage starts
    pub fn state(self) -> PipelineState {
        match self {
            Stage::Fetch => PipelineState::Fetching,
            Stage::Build => PipelineState::Building,
            Stage::Push => PipelineState::Pushing,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Fetch => write!(f, "fetch"),
            Stage::Build => write!(f, "build"),
            Stage::Push => write!(f, "push"),
        }
    }
}
