//! Inbound and outbound events

use crate::artifact::{Artifact, Artifacts};
use crate::request::ReleaseRequest;
use crate::state::PipelineState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Project-level extension notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectExtension {
    pub id: String,
    pub project: String,
}

/// Events the pipeline consumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InboundEvent {
    Release(ReleaseRequest),
    ProjectInstalled(ProjectExtension),
    ProjectUpdated(ProjectExtension),
}

impl InboundEvent {
    /// Identifier used as the subject of outbound events
    pub fn subject(&self) -> &str {
        match self {
            InboundEvent::Release(request) => &request.id,
            InboundEvent::ProjectInstalled(ext) | InboundEvent::ProjectUpdated(ext) => &ext.id,
        }
    }
}

/// What an outbound event reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Release,
    ProjectExtension,
}

/// Progress, failure or completion event the pipeline publishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub subject: String,
    pub kind: EventKind,
    pub state: PipelineState,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Artifacts::is_empty")]
    pub artifacts: Artifacts,
    pub emitted_at: DateTime<Utc>,
}

impl PipelineEvent {
    pub fn new(subject: impl Into<String>, kind: EventKind, state: PipelineState) -> Self {
        Self {
            subject: subject.into(),
            kind,
            state,
            message: String::new(),
            artifacts: Artifacts::new(),
            emitted_at: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn artifact(&self, key: &str) -> Option<&Artifact> {
        self.artifacts.get(key)
    }
}
