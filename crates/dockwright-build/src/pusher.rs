//! Image publishing
//!
//! Pushes the primary tag, re-tags the pushed image under the alias and pushes
//! the alias. Only one build ever happens; the alias is a local tag on the
//! same image.

use crate::auth::RegistryCredentials;
use crate::error::{PublishError, PublishResult};
use crate::image::{ImageReference, validate_tag};
use crate::log::BuildLog;
use bollard::Docker;
use bollard::models::PushImageInfo;
use futures_util::StreamExt;

/// Registry operations the publisher needs
#[allow(async_fn_in_trait)]
pub trait RegistryClient {
    /// Push `repository:tag`, appending progress to `log`
    async fn push(
        &self,
        repository: &str,
        tag: &str,
        credentials: &RegistryCredentials,
        log: &BuildLog,
    ) -> Result<(), String>;

    /// Tag the local image `source` as `repository:tag`, replacing any
    /// existing local tag of that name
    async fn tag(&self, source: &str, repository: &str, tag: &str) -> Result<(), String>;
}

/// `RegistryClient` backed by the Docker daemon
pub struct DockerRegistry {
    docker: Docker,
}

impl DockerRegistry {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    fn handle_progress(info: &PushImageInfo, last_status: &mut String, log: &BuildLog) {
        if let Some(status) = &info.status {
            match status.as_str() {
                // Noise: one line per layer per progress tick
                "Preparing" | "Waiting" | "Pushing" => {}
                _ => {
                    if status != last_status {
                        log.append_line(status);
                        *last_status = status.clone();
                    }
                }
            }
        }
    }
}

impl RegistryClient for DockerRegistry {
    async fn push(
        &self,
        repository: &str,
        tag: &str,
        credentials: &RegistryCredentials,
        log: &BuildLog,
    ) -> Result<(), String> {
        tracing::info!("Pushing {}:{}", repository, tag);

        #[allow(deprecated)]
        let options = bollard::image::PushImageOptions::<String> {
            tag: tag.to_string(),
        };

        #[allow(deprecated)]
        let mut stream =
            self.docker
                .push_image(repository, Some(options), Some(credentials.to_docker()));

        let mut last_status = String::new();
        let mut error_message: Option<String> = None;

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(err) = info.error {
                        log.append_line(&err);
                        error_message = Some(err);
                    } else {
                        Self::handle_progress(&info, &mut last_status, log);
                    }
                }
                Err(e) => {
                    log.append_line(&e.to_string());
                    return Err(e.to_string());
                }
            }
        }

        match error_message {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn tag(&self, source: &str, repository: &str, tag: &str) -> Result<(), String> {
        tracing::info!("Tagging {} as {}:{}", source, repository, tag);

        #[allow(deprecated)]
        let options = bollard::image::TagImageOptions {
            repo: repository.to_string(),
            tag: tag.to_string(),
        };

        self.docker
            .tag_image(source, Some(options))
            .await
            .map_err(|e| e.to_string())
    }
}

/// Publishes a built image under both policy tags
pub struct ImagePusher<R = DockerRegistry> {
    registry: R,
}

impl ImagePusher<DockerRegistry> {
    pub fn new(docker: Docker) -> Self {
        Self::with_registry(DockerRegistry::new(docker))
    }
}

impl<R: RegistryClient> ImagePusher<R> {
    pub fn with_registry(registry: R) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Push primary, tag alias, push alias
    ///
    /// A failed primary push stops before the alias is touched.
    pub async fn publish(
        &self,
        image: &ImageReference,
        credentials: &RegistryCredentials,
        log: &BuildLog,
    ) -> PublishResult<()> {
        validate_tag(image.primary_tag()).map_err(PublishError::InvalidTag)?;
        validate_tag(image.alias_tag()).map_err(PublishError::InvalidTag)?;

        let repository = image.repository_path();
        log.append_line(&format!("Pushing {}", repository));

        self.registry
            .push(repository, image.primary_tag(), credentials, log)
            .await
            .map_err(|message| PublishError::Push {
                reference: image.primary(),
                message,
            })?;

        self.registry
            .tag(&image.primary(), repository, image.alias_tag())
            .await
            .map_err(|message| PublishError::Tag {
                source_ref: image.primary(),
                target: image.alias(),
                message,
            })?;

        self.registry
            .push(repository, image.alias_tag(), credentials, log)
            .await
            .map_err(|message| PublishError::AliasPush {
                reference: image.alias(),
                message,
            })?;

        tracing::info!("Published {} and {}", image.primary(), image.alias());
        Ok(())
    }
}
