//! Pipeline controller
//!
//! Drives one release request through fetch, build and push, publishing a
//! progress event on entry to every state and exactly one terminal event.

use crate::error::{Result, StageError};
use crate::events::EventSink;
use crate::locks::WorkspaceLocks;
use crate::stages::{BuildStage, FetchStage, PublishStage};
use bollard::Docker;
use dockwright_build::{
    BuildError, BuildLog, ImageBuilder, ImagePusher, ImageReference, PublishError,
    RegistryCredentials, RegistryTarget, WorkspaceManager,
};
use dockwright_config::{PipelineConfig, StageTimeouts};
use dockwright_core::{
    Artifact, CoreError, EventKind, InboundEvent, PipelineEvent, PipelineState, ProjectExtension,
    ReleaseRequest, Stage, keys,
};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const COMPLETED_MESSAGE: &str = "Completed";
pub const INSTALLED_MESSAGE: &str = "installation complete";
pub const UPDATED_MESSAGE: &str = "update complete";

/// How an inbound event ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Image published; carries the primary reference
    Complete { image: String },
    /// A stage failed; `message` is the text of the failure event
    Failed { stage: Stage, message: String },
    /// Project event acknowledged without running the pipeline
    Acknowledged,
}

/// State and build log of one request
struct RunState {
    state: PipelineState,
    log: BuildLog,
}

impl RunState {
    fn new() -> Self {
        Self {
            state: PipelineState::INITIAL,
            log: BuildLog::new(),
        }
    }

    fn advance(&mut self, next: PipelineState) -> std::result::Result<(), CoreError> {
        self.state = self.state.transition(next)?;
        Ok(())
    }
}

pub struct Controller<F, B, P, S> {
    fetch: F,
    build: B,
    publish: P,
    sink: S,
    locks: WorkspaceLocks,
    timeouts: StageTimeouts,
    cancel: CancellationToken,
}

impl<S: EventSink> Controller<WorkspaceManager, ImageBuilder, ImagePusher, S> {
    /// Controller backed by git and the Docker daemon
    pub fn from_config(config: &PipelineConfig, docker: Docker, sink: S) -> Self {
        let builder = ImageBuilder::new(docker.clone()).with_dockerfile(config.dockerfile.clone());
        Self::new(
            WorkspaceManager::from_config(config),
            builder,
            ImagePusher::new(docker),
            sink,
        )
        .with_timeouts(config.timeouts)
    }
}

impl<F, B, P, S> Controller<F, B, P, S>
where
    F: FetchStage,
    B: BuildStage,
    P: PublishStage,
    S: EventSink,
{
    pub fn new(fetch: F, build: B, publish: P, sink: S) -> Self {
        Self {
            fetch,
            build,
            publish,
            sink,
            locks: WorkspaceLocks::new(),
            timeouts: StageTimeouts::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Share a lock table with other controllers in this process
    pub fn with_locks(mut self, locks: WorkspaceLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels the in-flight stage
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Process one inbound event to its terminal event
    ///
    /// Stage failures are reported as a `failed` event and `Outcome::Failed`;
    /// only a broken event sink or an invalid transition is an `Err`.
    pub async fn handle(&mut self, event: InboundEvent) -> Result<Outcome> {
        match event {
            InboundEvent::Release(request) => self.run_release(&request).await,
            InboundEvent::ProjectInstalled(ext) => self.acknowledge(&ext, INSTALLED_MESSAGE).await,
            InboundEvent::ProjectUpdated(ext) => self.acknowledge(&ext, UPDATED_MESSAGE).await,
        }
    }

    async fn acknowledge(&self, ext: &ProjectExtension, message: &str) -> Result<Outcome> {
        tracing::info!(project = %ext.project, "{}", message);
        let event = PipelineEvent::new(&ext.id, EventKind::ProjectExtension, PipelineState::Complete)
            .with_message(message);
        self.sink.emit(event).await?;
        Ok(Outcome::Acknowledged)
    }

    async fn run_release(&self, request: &ReleaseRequest) -> Result<Outcome> {
        let key = request.workspace_key();
        let _guard = self.locks.acquire(&key).await;
        tracing::info!(release = %request.id, workspace = %key, commit = %request.commit, "release started");

        let mut run = RunState::new();
        self.enter(request, &run).await?;

        let workspace = match self.guarded(Stage::Fetch, self.fetch.fetch(request)).await {
            Ok(path) => path,
            Err(err) => return self.fail(request, run, Stage::Fetch, err).await,
        };

        run.advance(PipelineState::Building)?;
        self.enter(request, &run).await?;

        let built = self
            .guarded(Stage::Build, async {
                let target = RegistryTarget::from_artifacts(&request.artifacts)
                    .map_err(|e| BuildError::MissingArtifact(missing_key(e)))?;
                let image = ImageReference::new(
                    &target,
                    &request.repository,
                    &request.commit,
                    &request.environment,
                );
                self.build
                    .build(request, &workspace, &image, &run.log)
                    .await?;
                Ok::<_, BuildError>(image)
            })
            .await;
        let image = match built {
            Ok(image) => image,
            Err(err) => return self.fail(request, run, Stage::Build, err).await,
        };

        run.advance(PipelineState::Pushing)?;
        self.enter(request, &run).await?;

        let published = self
            .guarded(Stage::Push, async {
                let credentials = RegistryCredentials::from_artifacts(&request.artifacts)
                    .map_err(|e| PublishError::MissingArtifact(missing_key(e)))?;
                self.publish.publish(&image, &credentials, &run.log).await
            })
            .await;
        if let Err(err) = published {
            return self.fail(request, run, Stage::Push, err).await;
        }

        run.advance(PipelineState::Complete)?;
        self.complete(request, &run, &image).await
    }

    /// Run a stage under its deadline and the cancellation token
    async fn guarded<T, E>(
        &self,
        stage: Stage,
        work: impl Future<Output = std::result::Result<T, E>>,
    ) -> std::result::Result<T, StageError>
    where
        StageError: From<E>,
    {
        let deadline = self.deadline(stage);
        let bounded = async {
            match deadline {
                Some(after) => match tokio::time::timeout(after, work).await {
                    Ok(result) => result.map_err(StageError::from),
                    Err(_) => Err(StageError::TimedOut { stage, after }),
                },
                None => work.await.map_err(StageError::from),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StageError::Cancelled { stage }),
            result = bounded => result,
        }
    }

    fn deadline(&self, stage: Stage) -> Option<Duration> {
        match stage {
            Stage::Fetch => self.timeouts.fetch(),
            Stage::Build => self.timeouts.build(),
            Stage::Push => self.timeouts.push(),
        }
    }

    async fn enter(&self, request: &ReleaseRequest, run: &RunState) -> Result<()> {
        tracing::info!(release = %request.id, state = %run.state, "entering state");
        let event = PipelineEvent::new(&request.id, EventKind::Release, run.state);
        self.sink.emit(event).await?;
        Ok(())
    }

    async fn fail(
        &self,
        request: &ReleaseRequest,
        mut run: RunState,
        stage: Stage,
        err: StageError,
    ) -> Result<Outcome> {
        run.advance(PipelineState::Failed)?;

        let message = format!("{} (stage: {})", err.user_message(), stage);
        tracing::error!(release = %request.id, %stage, "release failed: {}", err);
        if err.primary_published() {
            tracing::warn!(release = %request.id, "versioned image published, alias is stale");
        }

        let event = PipelineEvent::new(&request.id, EventKind::Release, PipelineState::Failed)
            .with_message(message.clone())
            .with_artifact(Artifact::public(keys::BUILD_LOG, run.log.to_string_lossy()));
        self.sink.emit(event).await?;

        Ok(Outcome::Failed { stage, message })
    }

    async fn complete(
        &self,
        request: &ReleaseRequest,
        run: &RunState,
        image: &ImageReference,
    ) -> Result<Outcome> {
        let mut event = PipelineEvent::new(&request.id, EventKind::Release, PipelineState::Complete)
            .with_message(COMPLETED_MESSAGE);
        for key in keys::CREDENTIALS {
            if let Some(artifact) = request.artifacts.get(key) {
                event = event.with_artifact(artifact.clone());
            }
        }
        let event = event
            .with_artifact(Artifact::public(keys::IMAGE, image.primary()))
            .with_artifact(Artifact::public(keys::BUILD_LOG, run.log.to_string_lossy()));
        self.sink.emit(event).await?;

        tracing::info!(release = %request.id, image = %image, "release complete");
        Ok(Outcome::Complete {
            image: image.primary(),
        })
    }
}

fn missing_key(err: CoreError) -> String {
    match err {
        CoreError::MissingArtifact(key) => key,
        other => other.to_string(),
    }
}
