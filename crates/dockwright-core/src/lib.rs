//! Dockwright core model
//!
//! Types shared by every pipeline stage: the inbound release request, the
//! artifacts carried on events, the pipeline state machine and the outbound
//! progress events.

pub mod artifact;
pub mod error;
pub mod event;
pub mod request;
pub mod state;

pub use artifact::{Artifact, Artifacts, keys};
pub use error::{CoreError, Result};
pub use event::{EventKind, InboundEvent, PipelineEvent, ProjectExtension};
pub use request::{ReleaseRequest, Secret, SecretString, SecretUsage, WorkspaceKey};
pub use state::{PipelineState, Stage};
