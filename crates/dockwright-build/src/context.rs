use crate::error::{BuildError, BuildResult};
use crate::git::Git;
use crate::log::BuildLog;
use std::io::Cursor;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};

const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024; // 500MB

pub struct ContextBuilder;

impl ContextBuilder {
    /// Archive the tree at `commit` as a tar build context
    ///
    /// Uses the commit, never the working tree, so local modifications in the
    /// checkout can't leak into the image. stdout is collected while stderr is
    /// drained into `log` at the same time, keeping both pipes flowing.
    pub async fn archive_commit(
        repo_path: &Path,
        commit: &str,
        log: &BuildLog,
    ) -> BuildResult<Vec<u8>> {
        if commit.is_empty() || commit.starts_with('-') {
            return Err(BuildError::Archive(format!("invalid commit '{}'", commit)));
        }

        tracing::debug!(
            "Archiving {} at {} as build context",
            repo_path.display(),
            commit
        );

        let mut child = Git::new()
            .command()
            .arg("archive")
            .arg("--format=tar")
            .arg(commit)
            .current_dir(repo_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BuildError::Archive(format!("failed to start git archive: {}", e)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| BuildError::Archive("git archive stdout unavailable".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BuildError::Archive("git archive stderr unavailable".into()))?;

        let collect = async {
            let mut context = Vec::new();
            stdout.read_to_end(&mut context).await?;
            Ok::<_, std::io::Error>(context)
        };
        let (context, diagnostics) = tokio::try_join!(collect, drain_into(stderr, log))?;

        let status = child.wait().await?;
        if !status.success() {
            let message = String::from_utf8_lossy(&diagnostics).trim().to_string();
            return Err(BuildError::Archive(if message.is_empty() {
                format!("git archive exited with {}", status)
            } else {
                message
            }));
        }

        tracing::debug!("Build context created: {} bytes", context.len());
        Self::check_context_size(context.len());

        Ok(context)
    }

    /// Whether the tar context contains `path`
    pub fn contains(context: &[u8], path: &str) -> BuildResult<bool> {
        let wanted = Path::new(path.trim_start_matches("./"));
        let mut archive = tar::Archive::new(Cursor::new(context));
        for entry in archive.entries()? {
            let entry = entry?;
            if entry.path()? == wanted {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Warn about contexts large enough to slow the daemon down
    fn check_context_size(size: usize) {
        if size > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "Build context is {}MB; consider export-ignore in .gitattributes",
                size / 1024 / 1024
            );
        }
    }
}

/// Copy `reader` into `log` chunk by chunk, returning what was read
async fn drain_into<R>(mut reader: R, log: &BuildLog) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        log.append(&chunk[..n]);
        captured.extend_from_slice(&chunk[..n]);
    }
    Ok(captured)
}
