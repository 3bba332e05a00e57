//! Controller runs against a real git workspace and the registry pusher

mod common;

use common::*;
use dockwright_build::{
    BuildLog, ImagePusher, RegistryClient, RegistryCredentials, WorkspaceManager,
};
use dockwright_config::StageTimeouts;
use dockwright_core::{InboundEvent, PipelineState, ReleaseRequest, Stage};
use dockwright_pipeline::{Controller, MemorySink, Outcome};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct RecordingRegistry {
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingRegistry {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl RegistryClient for RecordingRegistry {
    async fn push(
        &self,
        repository: &str,
        tag: &str,
        credentials: &RegistryCredentials,
        log: &BuildLog,
    ) -> Result<(), String> {
        log.append_line(&format!("{}: Pushed", tag));
        self.calls.lock().unwrap().push(format!(
            "push {}:{} as {}",
            repository, tag, credentials.username
        ));
        Ok(())
    }

    async fn tag(&self, source: &str, repository: &str, tag: &str) -> Result<(), String> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("tag {} {}:{}", source, repository, tag));
        Ok(())
    }
}

fn request_for(git_url: &str, commit: &str) -> ReleaseRequest {
    let mut request = release_request();
    request.git_url = git_url.to_string();
    request.commit = commit.to_string();
    request
}

#[tokio::test]
async fn test_release_with_real_workspace_and_pusher() {
    if !git_available() {
        return;
    }
    let remote = tempfile::tempdir().unwrap();
    let head = init_remote(remote.path());
    let workdir = tempfile::tempdir().unwrap();

    let manager = WorkspaceManager::new(workdir.path());
    let registry = RecordingRegistry::default();
    let build = MockBuild::default();
    let mut controller = Controller::new(
        manager.clone(),
        build.clone(),
        ImagePusher::with_registry(registry.clone()),
        MemorySink::new(),
    );

    let outcome = controller
        .handle(InboundEvent::Release(request_for(
            remote.path().to_str().unwrap(),
            &head,
        )))
        .await
        .unwrap();

    let image = format!("registry/acme/acme-app:{}.production", head);
    assert_eq!(outcome, Outcome::Complete { image: image.clone() });

    let checkout = manager.workspace_path("acme/app", "main");
    assert_eq!(git(&checkout, &["rev-parse", "HEAD"]), head);

    assert_eq!(
        registry.calls(),
        vec![
            format!("push registry/acme/acme-app:{}.production as deployer", head),
            format!("tag {} registry/acme/acme-app:latest", image),
            "push registry/acme/acme-app:latest as deployer".to_string(),
        ]
    );

    let complete = controller.sink().events().pop().unwrap();
    let log = &complete.artifact("build_log").unwrap().value;
    assert!(log.contains("Pushing registry/acme/acme-app\n"));
    assert!(log.ends_with("latest: Pushed\n"));
}

#[tokio::test]
async fn test_timed_out_fetch_does_not_poison_workspace() {
    if !git_available() {
        return;
    }
    // Accepts connections and never answers, so the clone hangs
    let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let stalled_url = format!("git://{}/acme/app.git", silent.local_addr().unwrap());

    let remote = tempfile::tempdir().unwrap();
    let head = init_remote(remote.path());
    let workdir = tempfile::tempdir().unwrap();
    let manager = WorkspaceManager::new(workdir.path());

    let mut controller = Controller::new(
        manager.clone(),
        MockBuild::default(),
        ImagePusher::with_registry(RecordingRegistry::default()),
        MemorySink::new(),
    )
    .with_timeouts(StageTimeouts {
        fetch_secs: Some(1),
        ..Default::default()
    });

    let first = controller
        .handle(InboundEvent::Release(request_for(&stalled_url, &head)))
        .await
        .unwrap();
    match first {
        Outcome::Failed { stage, message } => {
            assert_eq!(stage, Stage::Fetch);
            assert!(message.contains("timed out"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(!manager.workspace_path("acme/app", "main").exists());

    let retry = controller
        .handle(InboundEvent::Release(request_for(
            remote.path().to_str().unwrap(),
            &head,
        )))
        .await
        .unwrap();
    assert!(matches!(retry, Outcome::Complete { .. }));

    let states: Vec<_> = controller.sink().events().iter().map(|e| e.state).collect();
    assert_eq!(
        states,
        vec![
            PipelineState::Fetching,
            PipelineState::Failed,
            PipelineState::Fetching,
            PipelineState::Building,
            PipelineState::Pushing,
            PipelineState::Complete,
        ]
    );
}
