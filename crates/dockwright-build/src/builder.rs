use crate::context::ContextBuilder;
use crate::error::{BuildError, BuildResult};
use crate::image::ImageReference;
use crate::log::BuildLog;
use bollard::Docker;
use dockwright_config::DEFAULT_DOCKERFILE;
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::path::Path;

pub struct ImageBuilder {
    docker: Docker,
    dockerfile: String,
}

impl ImageBuilder {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            dockerfile: DEFAULT_DOCKERFILE.to_string(),
        }
    }

    pub fn with_dockerfile(mut self, dockerfile: impl Into<String>) -> Self {
        self.dockerfile = dockerfile.into();
        self
    }

    /// Archive `commit` from the workspace and build it as `image`
    pub async fn build_release(
        &self,
        workspace: &Path,
        commit: &str,
        image: &ImageReference,
        build_args: HashMap<String, String>,
        log: &BuildLog,
    ) -> BuildResult<()> {
        image.validate().map_err(BuildError::InvalidReference)?;

        let context = ContextBuilder::archive_commit(workspace, commit, log).await?;
        if !ContextBuilder::contains(&context, &self.dockerfile)? {
            return Err(BuildError::DockerfileNotFound {
                dockerfile: self.dockerfile.clone(),
                commit: commit.to_string(),
            });
        }

        self.build_image(context, &image.primary(), build_args, log)
            .await
    }

    /// Build an image from a tar context, streaming output into `log`
    pub async fn build_image(
        &self,
        context_data: Vec<u8>,
        tag: &str,
        build_args: HashMap<String, String>,
        log: &BuildLog,
    ) -> BuildResult<()> {
        tracing::info!("Building image: {}", tag);

        let build_args_refs: HashMap<&str, &str> = build_args
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        #[allow(deprecated)]
        let options = bollard::image::BuildImageOptions {
            dockerfile: self.dockerfile.as_str(),
            t: tag,
            buildargs: build_args_refs,
            rm: true,      // remove intermediate containers
            forcerm: true, // even when the build fails
            ..Default::default()
        };

        // Values are secrets; keys only.
        if !build_args.is_empty() {
            let mut keys: Vec<&str> = build_args.keys().map(String::as_str).collect();
            keys.sort_unstable();
            tracing::debug!("Build args: {:?}", keys);
        }

        use bytes::Bytes;
        use http_body_util::{Either, Full};
        let body = Full::new(Bytes::from(context_data));
        let mut stream = self
            .docker
            .build_image(options, None, Some(Either::Left(body)));

        while let Some(msg) = stream.next().await {
            match msg {
                Ok(output) => {
                    Self::handle_build_output(output, log)?;
                }
                Err(e) => {
                    log.append_line(&e.to_string());
                    return Err(BuildError::DockerConnection(e));
                }
            }
        }

        tracing::info!("Successfully built: {}", tag);
        Ok(())
    }

    fn handle_build_output(output: bollard::models::BuildInfo, log: &BuildLog) -> BuildResult<()> {
        if let Some(stream) = output.stream {
            let line = stream.trim_end();
            if !line.is_empty() {
                tracing::debug!("build: {}", line);
            }
            log.append(stream.as_bytes());
        }

        if let Some(status) = output.status {
            tracing::debug!("build: {}", status);
            log.append_line(&status);
        }

        if let Some(error) = output.error {
            log.append_line(&error);
            return Err(BuildError::BuildFailed(error));
        }

        if let Some(error_detail) = output.error_detail {
            let error_msg = error_detail
                .message
                .unwrap_or_else(|| "Unknown build error".to_string());
            log.append_line(&error_msg);
            return Err(BuildError::BuildFailed(error_msg));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{BuildInfo, ErrorDetail};

    #[test]
    fn test_stream_output_appended_verbatim() {
        let log = BuildLog::new();
        let output = BuildInfo {
            stream: Some("Step 1/2 : FROM alpine\n".to_string()),
            ..Default::default()
        };
        ImageBuilder::handle_build_output(output, &log).unwrap();
        assert_eq!(log.to_string_lossy(), "Step 1/2 : FROM alpine\n");
    }

    #[test]
    fn test_error_detail_fails_build_and_is_logged() {
        let log = BuildLog::new();
        let output = BuildInfo {
            error_detail: Some(ErrorDetail {
                code: None,
                message: Some("The command '/bin/sh -c false' returned a non-zero code: 1".into()),
            }),
            ..Default::default()
        };
        let result = ImageBuilder::handle_build_output(output, &log);
        assert!(matches!(result, Err(BuildError::BuildFailed(_))));
        assert!(log.to_string_lossy().contains("non-zero code"));
    }

    #[tokio::test]
    #[ignore] // needs a running Docker daemon
    async fn test_build_simple_image() {
        let docker = Docker::connect_with_local_defaults().unwrap();
        let builder = ImageBuilder::new(docker);

        let mut tar = tar::Builder::new(Vec::new());
        let dockerfile = b"FROM alpine:latest\nARG GREETING\nRUN echo $GREETING\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(dockerfile.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        tar.append_data(&mut header, "Dockerfile", &dockerfile[..])
            .unwrap();
        let context = tar.into_inner().unwrap();

        let log = BuildLog::new();
        let mut args = HashMap::new();
        args.insert("GREETING".to_string(), "hello".to_string());
        let result = builder
            .build_image(context, "dockwright-test:latest", args, &log)
            .await;

        assert!(result.is_ok());
        assert!(!log.is_empty());

        builder
            .docker
            .remove_image(
                "dockwright-test:latest",
                None::<bollard::query_parameters::RemoveImageOptions>,
                None,
            )
            .await
            .ok();
    }
}
