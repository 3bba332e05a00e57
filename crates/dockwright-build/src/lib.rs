//! Dockwright build stages
//!
//! Workspace checkout over git, commit-pinned build contexts, image builds
//! against the Docker daemon and registry publishing under the tag policy.

pub mod auth;
pub mod builder;
pub mod context;
pub mod docker;
pub mod error;
pub mod git;
pub mod image;
pub mod log;
pub mod pusher;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use auth::RegistryCredentials;
pub use builder::ImageBuilder;
pub use context::ContextBuilder;
pub use docker::connect;
pub use error::{
    BuildError, BuildResult, GitError, PublishError, PublishResult, WorkspaceError,
    WorkspaceResult,
};
pub use image::{ImageReference, RegistryTarget, slugify};
pub use log::BuildLog;
pub use pusher::{DockerRegistry, ImagePusher, RegistryClient};
pub use workspace::{Workspace, WorkspaceManager};
