//! Managed-process boundary.
//!
//! The lifecycle core never deals in signal numbers. It asks a
//! [`ProcessControl`] to spawn a process, to request a graceful stop, and
//! whether a process is still alive.

pub mod launcher;
#[cfg(unix)]
pub mod unix;

pub use launcher::{LaunchOutcome, LaunchRequest, ProcessLauncher};
#[cfg(unix)]
pub use unix::UnixProcessControl;

use std::collections::BTreeMap;
use std::fs::File;
use std::path::PathBuf;

/// What to run for a managed process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,

    /// Overrides layered over the supervisor's own environment, which the
    /// child inherits.
    pub env: BTreeMap<String, String>,
}

/// Platform capability for spawning, signalling and probing processes.
pub trait ProcessControl: Send + Sync {
    /// Spawn the process with stdout and stderr both written to `output`.
    ///
    /// Returns the process id. The child is detached: it keeps running after
    /// the supervisor exits.
    fn spawn(&self, spec: &SpawnSpec, output: File) -> std::io::Result<u32>;

    /// Ask the process to terminate gracefully.
    fn request_stop(&self, pid: u32) -> std::io::Result<()>;

    /// Whether the process is still running.
    fn is_alive(&self, pid: u32) -> bool;
}
