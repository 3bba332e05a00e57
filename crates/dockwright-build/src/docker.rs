use crate::error::{BuildError, BuildResult};
use bollard::{API_DEFAULT_VERSION, Docker};

/// Request timeout in seconds; long enough for a full build or push stream
const DOCKER_TIMEOUT_SECS: u64 = 3600;

/// Connect to the daemon at `endpoint`
///
/// Accepts `unix:///path`, a bare socket path, `tcp://host:port` or
/// `http://host:port`.
pub fn connect(endpoint: &str) -> BuildResult<Docker> {
    tracing::debug!("Connecting to docker at {}", endpoint);

    let docker = if let Some(path) = endpoint.strip_prefix("unix://") {
        Docker::connect_with_unix(path, DOCKER_TIMEOUT_SECS, API_DEFAULT_VERSION)?
    } else if endpoint.starts_with('/') {
        Docker::connect_with_unix(endpoint, DOCKER_TIMEOUT_SECS, API_DEFAULT_VERSION)?
    } else if endpoint.starts_with("tcp://") || endpoint.starts_with("http://") {
        Docker::connect_with_http(endpoint, DOCKER_TIMEOUT_SECS, API_DEFAULT_VERSION)?
    } else {
        return Err(BuildError::UnsupportedEndpoint(endpoint.to_string()));
    };

    Ok(docker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_endpoint() {
        assert!(matches!(
            connect("npipe:////./pipe/docker_engine"),
            Err(BuildError::UnsupportedEndpoint(_))
        ));
    }

    #[tokio::test]
    #[ignore] // needs a running Docker daemon
    async fn test_connect_default_socket() {
        let docker = connect("unix:///var/run/docker.sock").unwrap();
        assert!(docker.ping().await.is_ok());
    }
}
