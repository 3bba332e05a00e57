//! Registry credentials
//!
//! Read from the release event's artifacts and handed to Bollard as
//! `DockerCredentials`. The registry login itself is the daemon's job.

use bollard::auth::DockerCredentials;
use dockwright_core::{Artifacts, CoreError, SecretString, keys};

/// Credential set used for every push of one request
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: SecretString,
    pub email: String,
    pub server_address: String,
}

impl RegistryCredentials {
    /// `user`, `password` and `email` are required; `host` becomes the server
    /// address when present
    pub fn from_artifacts(artifacts: &Artifacts) -> Result<Self, CoreError> {
        let username = artifacts.require(keys::USER)?.value.clone();
        let password = SecretString::new(artifacts.require(keys::PASSWORD)?.value.as_str());
        let email = artifacts.require(keys::EMAIL)?.value.clone();
        let server_address = artifacts
            .get(keys::HOST)
            .map(|a| a.value.clone())
            .unwrap_or_default();

        Ok(Self {
            username,
            password,
            email,
            server_address,
        })
    }

    pub fn to_docker(&self) -> DockerCredentials {
        DockerCredentials {
            username: Some(self.username.clone()),
            password: Some(self.password.expose().to_string()),
            email: Some(self.email.clone()),
            serveraddress: (!self.server_address.is_empty())
                .then(|| self.server_address.clone()),
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &self.password)
            .field("email", &self.email)
            .field("server_address", &self.server_address)
            .finish()
    }
}
