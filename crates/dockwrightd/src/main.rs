//! dockwrightd
//!
//! Reads inbound events as JSON lines on stdin, runs each through the release
//! pipeline and writes every outbound event as one JSON line on stdout.

use anyhow::Context;
use clap::Parser;
use dockwright_config::{
    CONFIG_PATH_ENV, DOCKER_SOCKET_ENV, PipelineConfig, WORKDIR_ENV,
};
use dockwright_core::{InboundEvent, PipelineEvent};
use dockwright_pipeline::{Controller, Outcome};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Outbound events buffered ahead of the stdout writer
const EVENT_BUFFER: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "dockwrightd")]
#[command(about = "Build and publish container images for release events", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (YAML)
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Root directory for deploy keys and workspaces
    #[arg(short, long, env = WORKDIR_ENV)]
    workdir: Option<PathBuf>,

    /// Docker endpoint (unix:///path, tcp://host:port)
    #[arg(long, env = DOCKER_SOCKET_ENV)]
    docker_socket: Option<String>,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let mut config = PipelineConfig::from_file(path)?;
                config.apply_env_overrides();
                config
            }
            None => PipelineConfig::load()?,
        };

        if let Some(workdir) = &self.workdir {
            config.workdir = workdir.clone();
        }
        if let Some(socket) = &self.docker_socket {
            config.docker_socket = socket.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries events only
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = cli.load_config().context("Failed to load configuration")?;
    tracing::info!(
        workdir = %config.workdir.display(),
        docker = %config.docker_socket,
        "dockwrightd starting"
    );

    tokio::fs::create_dir_all(&config.workdir)
        .await
        .with_context(|| format!("Failed to create {}", config.workdir.display()))?;
    let docker = dockwright_build::connect(&config.docker_socket)?;

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let writer = tokio::spawn(write_events(rx));

    let mut controller = Controller::from_config(&config, docker, tx);
    let cancel = controller.cancellation_token();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling in-flight request");
                cancel.cancel();
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line.context("Failed to read stdin")?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let event = match parse_event(&line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Skipping malformed event: {}", e);
                continue;
            }
        };

        let subject = event.subject().to_string();
        match controller.handle(event).await? {
            Outcome::Complete { image } => tracing::info!(%subject, %image, "published"),
            Outcome::Failed { stage, .. } => tracing::warn!(%subject, %stage, "release failed"),
            Outcome::Acknowledged => tracing::info!(%subject, "acknowledged"),
        }
    }

    // Closing the channel lets the writer drain and exit.
    drop(controller);
    writer.await??;
    Ok(())
}

/// Parse one inbound line
///
/// The error names the position only: serde messages can quote field values,
/// and inbound events carry secrets.
fn parse_event(line: &str) -> Result<InboundEvent, String> {
    serde_json::from_str(line).map_err(|e| {
        format!(
            "{:?} error at line {} column {}",
            e.classify(),
            e.line(),
            e.column()
        )
    })
}

async fn write_events(mut rx: mpsc::Receiver<PipelineEvent>) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(event) = rx.recv().await {
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
        stdout.flush().await?;
    }
    Ok(())
}
