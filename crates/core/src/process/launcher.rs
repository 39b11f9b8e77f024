//! Process launcher.
//!
//! Launching a service means: spawn it with its output redirected to the
//! service log, record its handle immediately, then wait out a short grace
//! period and make sure it did not exit straight away.

use crate::error::{LifecycleError, LifecycleResult};
use crate::process::{ProcessControl, SpawnSpec};
use crate::store::HandleStore;
use ds_protocol::ServiceHandle;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Everything the launcher needs to start one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Service name, used as the handle record key.
    pub service: String,
    pub spawn: SpawnSpec,
    /// Log file receiving the merged stdout/stderr stream.
    pub log_path: PathBuf,
    /// How long the process must stay alive to count as started.
    pub grace_period: Duration,
}

/// Result of a successful launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// A new process was spawned and survived the grace period.
    Launched(ServiceHandle),

    /// A live process was already recorded for the service; nothing was spawned.
    AlreadyRunning(ServiceHandle),
}

impl LaunchOutcome {
    pub fn handle(&self) -> &ServiceHandle {
        match self {
            LaunchOutcome::Launched(handle) | LaunchOutcome::AlreadyRunning(handle) => handle,
        }
    }

    /// Whether this launch spawned a new process.
    pub fn is_new(&self) -> bool {
        matches!(self, LaunchOutcome::Launched(_))
    }
}

/// Starts managed processes and records their handles.
pub struct ProcessLauncher {
    process: Arc<dyn ProcessControl>,
    store: Arc<dyn HandleStore>,
}

impl ProcessLauncher {
    pub fn new(process: Arc<dyn ProcessControl>, store: Arc<dyn HandleStore>) -> Self {
        Self { process, store }
    }

    /// Launch the service described by `request`.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::LogFile` if the log file cannot be created
    /// - `LifecycleError::Spawn` if the process cannot be started
    /// - `LifecycleError::LaunchFailed` if it exits within the grace period;
    ///   its record is removed in that case
    /// - `LifecycleError::Store` if the handle cannot be recorded
    pub async fn launch(&self, request: &LaunchRequest) -> LifecycleResult<LaunchOutcome> {
        let service = request.service.as_str();

        if let Some(handle) = self.live_handle(service)? {
            info!(service, pid = ?handle.pid(), "already running");
            return Ok(LaunchOutcome::AlreadyRunning(handle));
        }

        let log = open_log(&request.log_path)?;
        let pid = self
            .process
            .spawn(&request.spawn, log)
            .map_err(|source| LifecycleError::Spawn {
                service: service.to_string(),
                program: request.spawn.program.clone(),
                source,
            })?;

        let handle = ServiceHandle::process(service, pid);
        if let Err(e) = self.store.put(&handle) {
            // An unrecorded process could never be stopped by us.
            if let Err(stop_err) = self.process.request_stop(pid) {
                warn!(service, pid, error = %stop_err, "failed to stop unrecorded process");
            }
            return Err(e.into());
        }
        info!(service, pid, log = %request.log_path.display(), "process started");

        tokio::time::sleep(request.grace_period).await;

        if !self.process.is_alive(pid) {
            warn!(service, pid, "process exited during its grace period");
            if let Err(e) = self.store.delete(service) {
                warn!(service, error = %e, "failed to remove handle record");
            }
            return Err(LifecycleError::LaunchFailed {
                service: service.to_string(),
                grace: request.grace_period,
                log: request.log_path.clone(),
            });
        }

        Ok(LaunchOutcome::Launched(handle))
    }

    /// The recorded handle for `service` if it still points at a live process.
    ///
    /// Stale or unreadable records are discarded.
    fn live_handle(&self, service: &str) -> LifecycleResult<Option<ServiceHandle>> {
        let handle = match self.store.get(service) {
            Ok(Some(handle)) => handle,
            Ok(None) => return Ok(None),
            Err(e) if e.is_malformed() => {
                warn!(service, error = %e, "discarding unreadable handle record");
                self.store.delete(service)?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match handle.pid() {
            Some(pid) if self.process.is_alive(pid) => Ok(Some(handle)),
            _ => {
                warn!(service, handle = %handle, "discarding stale handle record");
                self.store.delete(service)?;
                Ok(None)
            }
        }
    }
}

/// Open `path` for truncating writes, creating its directory.
fn open_log(path: &Path) -> LifecycleResult<File> {
    let to_error = |source| LifecycleError::LogFile {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(to_error)?;
    }
    File::create(path).map_err(to_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileHandleStore;
    use crate::testing::FakeProcessControl;
    use std::collections::BTreeMap;
    use tempfile::{tempdir, TempDir};

    fn request(dir: &TempDir, service: &str, program: &str) -> LaunchRequest {
        LaunchRequest {
            service: service.to_string(),
            spawn: SpawnSpec {
                program: PathBuf::from(program),
                args: Vec::new(),
                working_dir: dir.path().to_path_buf(),
                env: BTreeMap::new(),
            },
            log_path: dir.path().join("logs").join(format!("{service}.log")),
            grace_period: Duration::from_secs(2),
        }
    }

    fn make_launcher(
        dir: &TempDir,
        process: &Arc<FakeProcessControl>,
    ) -> (ProcessLauncher, Arc<FileHandleStore>) {
        let store = Arc::new(FileHandleStore::new(dir.path().join("logs")));
        let launcher = ProcessLauncher::new(process.clone(), store.clone());
        (launcher, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_records_handle_and_truncates_log() {
        let dir = tempdir().unwrap();
        let process = Arc::new(FakeProcessControl::new());
        let (launcher, store) = make_launcher(&dir, &process);

        let req = request(&dir, "orchestrator", "orchestrator-bin");
        std::fs::create_dir_all(dir.path().join("logs")).unwrap();
        std::fs::write(&req.log_path, "previous run").unwrap();

        let outcome = launcher.launch(&req).await.unwrap();

        assert!(outcome.is_new());
        let pid = outcome.handle().pid().unwrap();
        assert_eq!(store.get("orchestrator").unwrap().unwrap().pid(), Some(pid));
        assert_eq!(std::fs::read_to_string(&req.log_path).unwrap(), "");
        assert_eq!(process.spawned().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crash_on_start_is_launch_failure() {
        let dir = tempdir().unwrap();
        let process = Arc::new(FakeProcessControl::new().crash_on_start("runner-bin"));
        let (launcher, store) = make_launcher(&dir, &process);

        let result = launcher
            .launch(&request(&dir, "runner", "runner-bin"))
            .await;

        assert!(matches!(
            result,
            Err(LifecycleError::LaunchFailed { ref service, .. }) if service == "runner"
        ));
        assert!(store.get("runner").unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_failure_leaves_no_record() {
        let dir = tempdir().unwrap();
        let process = Arc::new(FakeProcessControl::new().fail_spawn("missing-bin"));
        let (launcher, store) = make_launcher(&dir, &process);

        let result = launcher
            .launch(&request(&dir, "runner", "missing-bin"))
            .await;

        assert!(matches!(result, Err(LifecycleError::Spawn { .. })));
        assert!(store.get("runner").unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_handle_is_not_launched_again() {
        let dir = tempdir().unwrap();
        let process = Arc::new(FakeProcessControl::new());
        let (launcher, _store) = make_launcher(&dir, &process);
        let req = request(&dir, "orchestrator", "orchestrator-bin");

        let first = launcher.launch(&req).await.unwrap();
        let second = launcher.launch(&req).await.unwrap();

        assert!(!second.is_new());
        assert_eq!(first.handle(), second.handle());
        assert_eq!(process.spawned().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_handle_is_replaced() {
        let dir = tempdir().unwrap();
        let process = Arc::new(FakeProcessControl::new());
        let (launcher, store) = make_launcher(&dir, &process);
        store.put(&ServiceHandle::process("orchestrator", 999_999)).unwrap();

        let outcome = launcher
            .launch(&request(&dir, "orchestrator", "orchestrator-bin"))
            .await
            .unwrap();

        assert!(outcome.is_new());
        assert_ne!(outcome.handle().pid(), Some(999_999));
        assert_eq!(store.get("orchestrator").unwrap().unwrap(), *outcome.handle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_record_is_replaced() {
        let dir = tempdir().unwrap();
        let process = Arc::new(FakeProcessControl::new());
        let (launcher, store) = make_launcher(&dir, &process);
        std::fs::create_dir_all(dir.path().join("logs")).unwrap();
        std::fs::write(dir.path().join("logs/runner.pid"), "garbage").unwrap();

        let outcome = launcher
            .launch(&request(&dir, "runner", "runner-bin"))
            .await
            .unwrap();

        assert!(outcome.is_new());
        assert!(store.get("runner").unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecordable_process_is_stopped() {
        let dir = tempdir().unwrap();
        let process = Arc::new(FakeProcessControl::new());
        // A plain file where the record directory should be
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, "").unwrap();
        let launcher = ProcessLauncher::new(
            process.clone(),
            Arc::new(FileHandleStore::new(&blocked)),
        );

        let result = launcher
            .launch(&request(&dir, "runner", "runner-bin"))
            .await;

        assert!(matches!(result, Err(LifecycleError::Store(_))));
        assert_eq!(process.stop_requests().len(), 1);
        assert!(process.alive().is_empty());
    }
}
