//! Lifecycle state models.
//!
//! This module defines the states the stack moves through while starting,
//! the stages a start can fail in, and the outcome of stopping a service.

use serde::{Deserialize, Serialize};

use crate::handle_models::ServiceHandle;

/// Observed state of the containerized dependency.
///
/// Always derived from the container runtime on demand, never cached.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyState {
    /// No container with the configured name exists.
    Absent,

    /// The container exists but is not running.
    Stopped,

    /// The container is running but its readiness check does not pass yet.
    Starting,

    /// The container is running and can serve requests.
    Ready,
}

/// Position of the stack in the start sequence.
///
/// A successful start progresses through:
/// DependencyPending -> DependencyReady -> ControlPlaneUp -> WorkerUp -> Running
///
/// Any failed stage returns to Stopped after rollback.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackState {
    /// Nothing is running (or everything was rolled back / torn down).
    Stopped,

    /// Waiting for the dependency to become ready.
    DependencyPending,

    /// Dependency is ready; application processes not launched yet.
    DependencyReady,

    /// Control-plane process survived its grace period.
    ControlPlaneUp,

    /// Worker process survived its grace period.
    WorkerUp,

    /// Every stage succeeded.
    Running,
}

/// A stage of the start sequence, used to report where a start failed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Dependency,
    Build,
    ControlPlane,
    Worker,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Dependency => "dependency",
            Stage::Build => "build",
            Stage::ControlPlane => "control-plane",
            Stage::Worker => "worker",
        };
        f.write_str(name)
    }
}

/// Result of asking the shutdown controller to stop one service.
///
/// Stopping never fails; it reports what it found instead.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    /// No handle was recorded for the service.
    NotRunning,

    /// The service exited after the graceful stop request.
    Stopped,

    /// The recorded handle pointed at nothing live, or the record was unreadable.
    /// The record was discarded.
    Stale,

    /// The service did not exit within the shutdown ceiling. The record was
    /// cleared anyway and the process may keep running unsupervised.
    TimedOut,
}

/// Summary of a successful start.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    /// Externally reachable address of the dependency.
    pub dependency_address: String,

    /// Externally reachable endpoint of the control plane, when configured.
    pub control_plane_endpoint: Option<String>,

    /// Names of the services that were launched by this start.
    ///
    /// Empty when the whole stack was already running.
    pub launched: Vec<String>,
}

/// Summary of a `clean`, which never fails.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CleanReport {
    /// What happened to each service, in stop order.
    pub stopped: Vec<(String, StopOutcome)>,

    /// Whether the dependency container and its data were removed.
    pub container_removed: bool,
}

/// One row of the status listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    /// The persisted handle.
    pub handle: ServiceHandle,

    /// Whether the handle currently points at something live.
    pub alive: bool,
}

/// Snapshot of the whole stack, as reported by `status`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StackStatus {
    /// Current state of the dependency container.
    pub dependency: DependencyState,

    /// Every persisted handle, in record order.
    pub services: Vec<ServiceStatus>,
}
