//! Error types for the service lifecycle.
//!
//! Stale handles and shutdown timeouts are not errors: the shutdown
//! controller reports them as [`StopOutcome`](ds_protocol::StopOutcome)
//! values and never fails.

use crate::runtime::RuntimeError;
use crate::store::StoreError;
use ds_protocol::Stage;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by individual lifecycle components.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The dependency never passed its readiness check within the budget.
    #[error("{container} was not ready after {attempts} readiness checks")]
    DependencyUnavailable { container: String, attempts: u32 },

    /// The process exited before its grace period elapsed.
    #[error("{service} exited within {grace:?} of launch, see {log}")]
    LaunchFailed {
        service: String,
        grace: Duration,
        log: PathBuf,
    },

    /// The process could not be spawned at all.
    #[error("Failed to spawn {service} ({program}): {source}")]
    Spawn {
        service: String,
        program: PathBuf,
        source: std::io::Error,
    },

    /// The service log file could not be opened for writing.
    #[error("Failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The build command failed or could not be run.
    #[error("Build command `{command}` failed: {reason}")]
    BuildFailed { command: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Type alias for Result with LifecycleError.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// A failed start, reported after every earlier stage was rolled back.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct StartError {
    /// The stage that failed.
    pub stage: Stage,

    /// What went wrong in that stage.
    #[source]
    pub source: LifecycleError,
}
