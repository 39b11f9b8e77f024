//! Stack configuration models for `devstack.toml`.
//!
//! The configuration is loaded once and handed to the lifecycle core as an
//! immutable value. Every field has a default reproducing the standard
//! development stack, so an empty file (or no file) is a valid configuration.
//!
//! # Example
//!
//! ```toml
//! # devstack.toml
//! logs-dir = "logs"
//!
//! [database]
//! container = "rivet_postgres"
//! port = 5432
//!
//! [worker]
//! name = "runner"
//! program = "./target/debug/rivet-runner"
//! env = { RUNNER_ID = "runner-2" }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level stack configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct StackConfig {
    /// Directory holding per-service log files and handle records.
    pub logs_dir: PathBuf,

    /// The containerized database the application processes depend on.
    pub database: DatabaseConfig,

    /// The control-plane process, launched after the database.
    pub control_plane: ServiceConfig,

    /// The worker process, launched after the control plane.
    pub worker: ServiceConfig,

    /// Graceful shutdown budget.
    pub shutdown: ShutdownConfig,

    /// Build step run before the application processes are launched.
    pub build: BuildConfig,

    /// Delay between the stop and start halves of a restart.
    pub restart_settle_ms: u64,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from("logs"),
            database: DatabaseConfig::default(),
            control_plane: ServiceConfig::default_control_plane(),
            worker: ServiceConfig::default_worker(),
            shutdown: ShutdownConfig::default(),
            build: BuildConfig::default(),
            restart_settle_ms: 1000,
        }
    }
}

impl StackConfig {
    pub fn restart_settle(&self) -> Duration {
        Duration::from_millis(self.restart_settle_ms)
    }
}

/// Settings for the database container.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct DatabaseConfig {
    /// Container runtime executable (`podman` or `docker`).
    pub runtime: String,

    /// Fixed container name; also the service name of its handle record.
    pub container: String,

    /// Image used when the container has to be created.
    pub image: String,

    /// Host the application processes use to reach the database.
    pub host: String,

    /// Port published from the container to the host.
    pub port: u16,

    pub user: String,
    pub password: String,
    pub database: String,

    /// Command executed inside the container to check readiness.
    ///
    /// Defaults to `pg_isready -U <user>` when empty.
    pub readiness_command: Vec<String>,

    /// Number of readiness checks before giving up.
    pub readiness_attempts: u32,

    /// Fixed delay between failed readiness checks.
    pub readiness_interval_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            runtime: "podman".to_string(),
            container: "rivet_postgres".to_string(),
            image: "docker.io/postgres:16-alpine".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            user: "rivet".to_string(),
            password: "rivet".to_string(),
            database: "rivet".to_string(),
            readiness_command: Vec::new(),
            readiness_attempts: 30,
            readiness_interval_ms: 1000,
        }
    }
}

impl DatabaseConfig {
    /// Connection URL handed to services that need the database.
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }

    /// Environment passed to the container when it is created.
    pub fn container_env(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("POSTGRES_USER".to_string(), self.user.clone()),
            ("POSTGRES_PASSWORD".to_string(), self.password.clone()),
            ("POSTGRES_DB".to_string(), self.database.clone()),
        ])
    }

    /// The readiness command, falling back to `pg_isready`.
    pub fn readiness_command(&self) -> Vec<String> {
        if self.readiness_command.is_empty() {
            vec!["pg_isready".to_string(), "-U".to_string(), self.user.clone()]
        } else {
            self.readiness_command.clone()
        }
    }

    pub fn readiness_interval(&self) -> Duration {
        Duration::from_millis(self.readiness_interval_ms)
    }
}

/// A long-running application process managed by the supervisor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ServiceConfig {
    /// Service name; names the log file and the handle record.
    pub name: String,

    /// Executable to run, relative to the project root unless absolute.
    pub program: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory, relative to the project root. Defaults to the root.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Environment overrides layered over the supervisor's environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// When set, the database URL is exported under this variable name.
    #[serde(default)]
    pub dependency_env: Option<String>,

    /// Address printed after a successful start.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// How long the process must survive after spawn to count as started.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
}

fn default_grace_period_ms() -> u64 {
    2000
}

impl ServiceConfig {
    /// The control plane of the standard development stack.
    pub fn default_control_plane() -> Self {
        Self {
            name: "orchestrator".to_string(),
            program: PathBuf::from("./target/debug/rivet-orchestrator"),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::from([
                ("RUST_LOG".to_string(), "debug".to_string()),
                (
                    "ORCHESTRATOR_BIND_ADDR".to_string(),
                    "0.0.0.0:8080".to_string(),
                ),
            ]),
            dependency_env: Some("DATABASE_URL".to_string()),
            endpoint: Some("http://localhost:8080".to_string()),
            grace_period_ms: default_grace_period_ms(),
        }
    }

    /// The worker of the standard development stack.
    pub fn default_worker() -> Self {
        Self {
            name: "runner".to_string(),
            program: PathBuf::from("./target/debug/rivet-runner"),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::from([
                ("RUST_LOG".to_string(), "debug".to_string()),
                (
                    "ORCHESTRATOR_URL".to_string(),
                    "http://localhost:8080".to_string(),
                ),
                ("RUNNER_ID".to_string(), "runner-1".to_string()),
            ]),
            dependency_env: None,
            endpoint: None,
            grace_period_ms: default_grace_period_ms(),
        }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

/// Graceful shutdown budget: poll liveness `attempts` times, `interval_ms` apart.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ShutdownConfig {
    pub attempts: u32,
    pub interval_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval_ms: 500,
        }
    }
}

impl ShutdownConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Build command run in the project root before launching processes.
///
/// An empty command disables the build step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildConfig {
    pub command: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            command: vec!["cargo".to_string(), "build".to_string()],
        }
    }
}

impl BuildConfig {
    pub fn is_enabled(&self) -> bool {
        !self.command.is_empty()
    }
}
