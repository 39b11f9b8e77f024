//! Container runtime boundary.
//!
//! The lifecycle core only needs a handful of semantic operations from the
//! container runtime. [`CliContainerRuntime`] implements them by shelling out
//! to `podman` or `docker`.

pub mod cli;

pub use cli::CliContainerRuntime;

use async_trait::async_trait;
use ds_protocol::DatabaseConfig;
use std::collections::BTreeMap;
use thiserror::Error;

/// Everything needed to create the dependency container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// `(host, container)` port pairs to publish.
    pub ports: Vec<(u16, u16)>,
    pub env: BTreeMap<String, String>,
}

impl ContainerSpec {
    /// The database container described by `database`.
    pub fn for_database(database: &DatabaseConfig) -> Self {
        Self {
            name: database.container.clone(),
            image: database.image.clone(),
            ports: vec![(database.port, 5432)],
            env: database.container_env(),
        }
    }
}

/// Errors reported by the container runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The runtime executable is not installed.
    #[error("Container runtime '{0}' was not found on PATH")]
    NotInstalled(String),

    /// The runtime command could not be started.
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// The runtime command ran but reported failure.
    #[error("`{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Operations the lifecycle core needs from a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Whether a container named `name` is currently running.
    async fn is_running(&self, name: &str) -> Result<bool, RuntimeError>;

    /// Whether a container named `name` exists, running or not.
    async fn exists(&self, name: &str) -> Result<bool, RuntimeError>;

    /// Create the container described by `spec` and start it.
    async fn create_and_start(&self, spec: &ContainerSpec) -> Result<(), RuntimeError>;

    /// Start an existing, stopped container.
    async fn start(&self, name: &str) -> Result<(), RuntimeError>;

    /// Stop a running container.
    async fn stop(&self, name: &str) -> Result<(), RuntimeError>;

    /// Remove the container and its data, stopping it first if needed.
    async fn remove(&self, name: &str) -> Result<(), RuntimeError>;

    /// Run `command` inside the container; `true` when it exits successfully.
    ///
    /// Any failure to run the command counts as "not ready".
    async fn readiness_check(&self, name: &str, command: &[String]) -> bool;
}
