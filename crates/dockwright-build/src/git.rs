//! git CLI wrapper

use crate::error::GitError;
use std::ffi::OsStr;
use std::process::Stdio;
use tokio::process::Command;

/// git invocations sharing one environment
#[derive(Debug, Clone, Default)]
pub struct Git {
    envs: Vec<(String, String)>,
}

impl Git {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Base command with the environment applied; killed if dropped
    pub fn command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        cmd
    }

    /// Run git and return its combined output
    pub async fn run<I, S>(&self, args: I) -> Result<String, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args
            .into_iter()
            .map(|a| a.as_ref().to_os_string())
            .collect();
        let shown = args
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(args = %shown, "executing git");

        let output = self
            .command()
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => GitError::NotFound,
                _ => GitError::Io(e),
            })?;

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        let combined = String::from_utf8_lossy(&combined).trim().to_string();

        if !output.status.success() {
            return Err(GitError::Failed(combined));
        }

        tracing::debug!("git {}: {}", shown, combined);
        Ok(combined)
    }
}
