//! Container runtime driven through the `podman` / `docker` command line.

use crate::runtime::{ContainerRuntime, ContainerSpec, RuntimeError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

/// [`ContainerRuntime`] implemented by invoking a docker-compatible CLI.
#[derive(Debug, Clone)]
pub struct CliContainerRuntime {
    binary: PathBuf,
}

impl CliContainerRuntime {
    /// Use `binary` as is, resolving it through `PATH` at call time.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Resolve `binary` on `PATH` up front.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::NotInstalled` if the executable cannot be found.
    pub fn locate(binary: &str) -> Result<Self, RuntimeError> {
        let path =
            which::which(binary).map_err(|_| RuntimeError::NotInstalled(binary.to_string()))?;
        Ok(Self::new(path))
    }

    fn describe(&self, args: &[String]) -> String {
        let program = self
            .binary
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.binary.display().to_string());
        std::iter::once(program)
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn output(&self, args: &[String]) -> Result<Output, RuntimeError> {
        debug!(command = %self.describe(args), "running container runtime");
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| RuntimeError::Spawn {
                command: self.describe(args),
                source,
            })
    }

    async fn run_checked(&self, args: &[String]) -> Result<String, RuntimeError> {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(RuntimeError::CommandFailed {
                command: self.describe(args),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn listed(&self, name: &str, all: bool) -> Result<bool, RuntimeError> {
        let stdout = self.run_checked(&ps_args(name, all)).await?;
        Ok(stdout.lines().any(|line| line.trim() == name))
    }
}

fn ps_args(name: &str, all: bool) -> Vec<String> {
    let mut args = vec!["ps".to_string()];
    if all {
        args.push("-a".to_string());
    }
    args.extend([
        "--filter".to_string(),
        format!("name={name}"),
        "--format".to_string(),
        "{{.Names}}".to_string(),
    ]);
    args
}

fn run_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        spec.name.clone(),
    ];
    for (host, container) in &spec.ports {
        args.push("-p".to_string());
        args.push(format!("{host}:{container}"));
    }
    for (key, value) in &spec.env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }
    args.push(spec.image.clone());
    args
}

fn exec_args(name: &str, command: &[String]) -> Vec<String> {
    let mut args = vec!["exec".to_string(), name.to_string()];
    args.extend(command.iter().cloned());
    args
}

#[async_trait]
impl ContainerRuntime for CliContainerRuntime {
    async fn is_running(&self, name: &str) -> Result<bool, RuntimeError> {
        self.listed(name, false).await
    }

    async fn exists(&self, name: &str) -> Result<bool, RuntimeError> {
        self.listed(name, true).await
    }

    async fn create_and_start(&self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        self.run_checked(&run_args(spec)).await.map(|_| ())
    }

    async fn start(&self, name: &str) -> Result<(), RuntimeError> {
        self.run_checked(&["start".to_string(), name.to_string()])
            .await
            .map(|_| ())
    }

    async fn stop(&self, name: &str) -> Result<(), RuntimeError> {
        self.run_checked(&["stop".to_string(), name.to_string()])
            .await
            .map(|_| ())
    }

    async fn remove(&self, name: &str) -> Result<(), RuntimeError> {
        self.run_checked(&["rm".to_string(), "-f".to_string(), name.to_string()])
            .await
            .map(|_| ())
    }

    async fn readiness_check(&self, name: &str, command: &[String]) -> bool {
        match self.output(&exec_args(name, command)).await {
            Ok(output) => output.status.success(),
            Err(e) => {
                debug!(error = %e, "readiness check could not run");
                false
            }
        }
    }
}
