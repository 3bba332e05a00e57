pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DOCKER_SOCKET: &str = "unix:///var/run/docker.sock";
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Config file path override
pub const CONFIG_PATH_ENV: &str = "DOCKWRIGHT_CONFIG";
pub const WORKDIR_ENV: &str = "DOCKWRIGHT_WORKDIR";
pub const DOCKER_SOCKET_ENV: &str = "DOCKWRIGHT_DOCKER_SOCKET";

const CONFIG_FILE_NAME: &str = "dockwright.yaml";

/// Where deploy keys live on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyScope {
    /// `<workdir>/<repository>_id_rsa`, written once and reused
    #[default]
    Repository,
    /// Temporary file removed when the fetch stage ends
    Request,
}

/// Identity exported to git as author/committer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitIdentity {
    pub user_name: String,
    pub user_email: String,
}

impl Default for GitIdentity {
    fn default() -> Self {
        Self {
            user_name: "dockwright".to_string(),
            user_email: "dockwright@localhost".to_string(),
        }
    }
}

/// Per-stage deadlines in seconds; unset means no deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StageTimeouts {
    pub fetch_secs: Option<u64>,
    pub build_secs: Option<u64>,
    pub push_secs: Option<u64>,
}

impl StageTimeouts {
    pub fn fetch(&self) -> Option<Duration> {
        self.fetch_secs.map(Duration::from_secs)
    }

    pub fn build(&self) -> Option<Duration> {
        self.build_secs.map(Duration::from_secs)
    }

    pub fn push(&self) -> Option<Duration> {
        self.push_secs.map(Duration::from_secs)
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of deploy keys and workspace checkouts
    pub workdir: PathBuf,
    /// Container daemon endpoint used for build and push
    pub docker_socket: String,
    /// Dockerfile path inside the build context
    pub dockerfile: String,
    pub key_scope: KeyScope,
    pub git: GitIdentity,
    pub timeouts: StageTimeouts,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workdir: default_workdir(),
            docker_socket: DEFAULT_DOCKER_SOCKET.to_string(),
            dockerfile: DEFAULT_DOCKERFILE.to_string(),
            key_scope: KeyScope::default(),
            git: GitIdentity::default(),
            timeouts: StageTimeouts::default(),
        }
    }
}

impl PipelineConfig {
    /// Discover, parse, apply env overrides and validate
    pub fn load() -> Result<Self> {
        let mut config = match find_config_file()? {
            Some(path) => Self::from_file(&path)?,
            None => {
                tracing::debug!("No config file found, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// `DOCKWRIGHT_WORKDIR` and `DOCKWRIGHT_DOCKER_SOCKET` win over the file
    pub fn apply_env_overrides(&mut self) {
        if let Ok(workdir) = std::env::var(WORKDIR_ENV)
            && !workdir.is_empty()
        {
            self.workdir = PathBuf::from(workdir);
        }
        if let Ok(socket) = std::env::var(DOCKER_SOCKET_ENV)
            && !socket.is_empty()
        {
            self.docker_socket = socket;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workdir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("workdir must not be empty".into()));
        }
        if self.docker_socket.trim().is_empty() {
            return Err(ConfigError::Invalid("docker_socket must not be empty".into()));
        }
        if self.dockerfile.trim().is_empty() {
            return Err(ConfigError::Invalid("dockerfile must not be empty".into()));
        }
        let timeouts = [
            ("fetch_secs", self.timeouts.fetch_secs),
            ("build_secs", self.timeouts.build_secs),
            ("push_secs", self.timeouts.push_secs),
        ];
        for (name, value) in timeouts {
            if value == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "timeouts.{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }
}

fn default_workdir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("dockwright"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/dockwright"))
}

/// Dockwright's global config directory
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dockwright"))
}

/// Find the config file
///
/// Search order:
/// 1. `DOCKWRIGHT_CONFIG` (must exist when set)
/// 2. Current directory: dockwright.yaml
/// 3. `~/.config/dockwright/config.yaml`
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV)
        && !config_path.is_empty()
    {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::FileNotFound(path));
    }

    let local = std::env::current_dir()?.join(CONFIG_FILE_NAME);
    if local.exists() {
        return Ok(Some(local));
    }

    if let Some(config_dir) = get_config_dir() {
        let global_config = config_dir.join("config.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}
