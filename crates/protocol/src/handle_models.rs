//! Persisted handle models.
//!
//! A handle is the record the supervisor keeps for every service it started.
//! It survives restarts of the supervisor itself and is the only thing that
//! decides whether a service is "ours" to stop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque reference to the thing backing a supervised service.
///
/// Serialized as an internally tagged object:
/// ```json
/// { "type": "process", "pid": 4242 }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandleKind {
    /// An OS process spawned by the launcher.
    Process {
        /// OS process identifier, used to signal and probe liveness.
        pid: u32,
    },

    /// A container managed through the container runtime.
    Container {
        /// Container name as known to the runtime.
        container: String,
    },
}

/// One supervised, currently-running (as far as the supervisor knows) service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    /// Unique service name within the stack (e.g. "orchestrator").
    pub name: String,

    /// The handle used to signal or probe the service later.
    pub kind: HandleKind,

    /// When the handle was recorded.
    pub started_at: DateTime<Utc>,
}

impl ServiceHandle {
    /// Create a handle for a freshly spawned process.
    pub fn process(name: impl Into<String>, pid: u32) -> Self {
        Self {
            name: name.into(),
            kind: HandleKind::Process { pid },
            started_at: Utc::now(),
        }
    }

    /// Create a handle for a container the supervisor brought up.
    pub fn container(name: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: HandleKind::Container {
                container: container.into(),
            },
            started_at: Utc::now(),
        }
    }

    /// The process id, if this handle refers to a process.
    pub fn pid(&self) -> Option<u32> {
        match self.kind {
            HandleKind::Process { pid } => Some(pid),
            HandleKind::Container { .. } => None,
        }
    }
}

impl std::fmt::Display for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            HandleKind::Process { pid } => write!(f, "{} (PID: {pid})", self.name),
            HandleKind::Container { container } => {
                write!(f, "{} (container: {container})", self.name)
            }
        }
    }
}
