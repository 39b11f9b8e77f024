//! Shutdown controller.
//!
//! Stopping a service is best effort and never fails: the controller reports
//! a [`StopOutcome`] and always clears the service's handle record, even when
//! the service could not be confirmed stopped. A process that ignores the
//! graceful request is left running unsupervised; it is never force-killed.

use crate::probe::{self, Readiness, RetryPolicy};
use crate::process::ProcessControl;
use crate::runtime::ContainerRuntime;
use crate::store::HandleStore;
use ds_protocol::{HandleKind, StopOutcome};
use std::sync::Arc;
use tracing::{info, warn};

pub struct ShutdownController {
    process: Arc<dyn ProcessControl>,
    runtime: Arc<dyn ContainerRuntime>,
    store: Arc<dyn HandleStore>,
    policy: RetryPolicy,
}

impl ShutdownController {
    /// Create a controller that waits for exit according to `policy`.
    pub fn new(
        process: Arc<dyn ProcessControl>,
        runtime: Arc<dyn ContainerRuntime>,
        store: Arc<dyn HandleStore>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            process,
            runtime,
            store,
            policy,
        }
    }

    /// Stop the service recorded under `name` and forget its handle.
    pub async fn stop(&self, name: &str) -> StopOutcome {
        let handle = match self.store.get(name) {
            Ok(Some(handle)) => handle,
            Ok(None) => return StopOutcome::NotRunning,
            Err(e) => {
                warn!(service = name, error = %e, "discarding unreadable handle record");
                self.discard(name);
                return StopOutcome::Stale;
            }
        };

        let outcome = match &handle.kind {
            HandleKind::Process { pid } => self.stop_process(name, *pid).await,
            HandleKind::Container { container } => self.stop_container(name, container).await,
        };

        self.discard(name);
        outcome
    }

    async fn stop_process(&self, name: &str, pid: u32) -> StopOutcome {
        if !self.process.is_alive(pid) {
            info!(service = name, pid, "process already gone");
            return StopOutcome::Stale;
        }

        info!(service = name, pid, "stopping");
        if let Err(e) = self.process.request_stop(pid) {
            if !self.process.is_alive(pid) {
                return StopOutcome::Stale;
            }
            warn!(service = name, pid, error = %e, "failed to signal process");
        }

        let process = self.process.as_ref();
        let exited = probe::poll(move || async move { !process.is_alive(pid) }, self.policy).await;

        match exited {
            Readiness::Ready { .. } => StopOutcome::Stopped,
            Readiness::TimedOut { .. } => {
                warn!(
                    service = name,
                    pid,
                    ceiling = ?self.policy.ceiling(),
                    "process did not exit in time, leaving it unsupervised"
                );
                StopOutcome::TimedOut
            }
        }
    }

    async fn stop_container(&self, name: &str, container: &str) -> StopOutcome {
        match self.runtime.is_running(container).await {
            Ok(false) => {
                info!(service = name, container, "container not running");
                return StopOutcome::Stale;
            }
            Ok(true) => {}
            Err(e) => warn!(service = name, container, error = %e, "could not query container"),
        }

        info!(service = name, container, "stopping container");
        match self.runtime.stop(container).await {
            Ok(()) => StopOutcome::Stopped,
            Err(e) => {
                warn!(service = name, container, error = %e, "failed to stop container");
                StopOutcome::TimedOut
            }
        }
    }

    fn discard(&self, name: &str) {
        if let Err(e) = self.store.delete(name) {
            warn!(service = name, error = %e, "failed to remove handle record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileHandleStore;
    use crate::testing::{FakeContainerRuntime, FakeProcessControl};
    use ds_protocol::ServiceHandle;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tokio::time::Instant;

    struct Fixture {
        _dir: TempDir,
        process: Arc<FakeProcessControl>,
        runtime: Arc<FakeContainerRuntime>,
        store: Arc<FileHandleStore>,
        controller: ShutdownController,
    }

    fn fixture(process: FakeProcessControl, runtime: FakeContainerRuntime) -> Fixture {
        let dir = tempdir().unwrap();
        let process = Arc::new(process);
        let runtime = Arc::new(runtime);
        let store = Arc::new(FileHandleStore::new(dir.path()));
        let controller = ShutdownController::new(
            process.clone(),
            runtime.clone(),
            store.clone(),
            RetryPolicy::new(10, Duration::from_millis(500)),
        );
        Fixture {
            _dir: dir,
            process,
            runtime,
            store,
            controller,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_without_record_is_noop() {
        let f = fixture(FakeProcessControl::new(), FakeContainerRuntime::absent());

        assert_eq!(f.controller.stop("runner").await, StopOutcome::NotRunning);
        assert!(f.process.stop_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_running_process() {
        let f = fixture(FakeProcessControl::new(), FakeContainerRuntime::absent());
        let pid = f.process.start_external("runner-bin");
        f.store.put(&ServiceHandle::process("runner", pid)).unwrap();

        assert_eq!(f.controller.stop("runner").await, StopOutcome::Stopped);
        assert_eq!(f.process.stop_requests(), vec![pid]);
        assert!(!f.process.is_alive(pid));
        assert!(f.store.get("runner").unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_twice_is_safe() {
        let f = fixture(FakeProcessControl::new(), FakeContainerRuntime::absent());
        let pid = f.process.start_external("runner-bin");
        f.store.put(&ServiceHandle::process("runner", pid)).unwrap();

        assert_eq!(f.controller.stop("runner").await, StopOutcome::Stopped);
        assert_eq!(f.controller.stop("runner").await, StopOutcome::NotRunning);
        assert_eq!(f.process.stop_requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_pid_is_discarded() {
        let f = fixture(FakeProcessControl::new(), FakeContainerRuntime::absent());
        f.store.put(&ServiceHandle::process("runner", 424_242)).unwrap();

        assert_eq!(f.controller.stop("runner").await, StopOutcome::Stale);
        assert!(f.process.stop_requests().is_empty());
        assert!(f.store.get("runner").unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_record_is_discarded() {
        let f = fixture(FakeProcessControl::new(), FakeContainerRuntime::absent());
        std::fs::write(f.store.dir().join("runner.pid"), "12 34").unwrap();

        assert_eq!(f.controller.stop("runner").await, StopOutcome::Stale);
        assert!(!f.store.dir().join("runner.pid").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_still_clears_record() {
        let f = fixture(
            FakeProcessControl::new().ignore_stop("stubborn-bin"),
            FakeContainerRuntime::absent(),
        );
        let pid = f.process.start_external("stubborn-bin");
        f.store.put(&ServiceHandle::process("runner", pid)).unwrap();
        let start = Instant::now();

        assert_eq!(f.controller.stop("runner").await, StopOutcome::TimedOut);

        assert!(start.elapsed() <= Duration::from_secs(5));
        // Not force-killed
        assert!(f.process.is_alive(pid));
        assert!(f.store.get("runner").unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_container() {
        let f = fixture(FakeProcessControl::new(), FakeContainerRuntime::running());
        f.store
            .put(&ServiceHandle::container("rivet_postgres", "rivet_postgres"))
            .unwrap();

        assert_eq!(f.controller.stop("rivet_postgres").await, StopOutcome::Stopped);
        assert!(!f.runtime.is_container_running());
        assert!(f.store.get("rivet_postgres").unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_container_already_stopped() {
        let f = fixture(FakeProcessControl::new(), FakeContainerRuntime::stopped());
        f.store
            .put(&ServiceHandle::container("rivet_postgres", "rivet_postgres"))
            .unwrap();

        assert_eq!(f.controller.stop("rivet_postgres").await, StopOutcome::Stale);
        assert!(f.runtime.calls().is_empty());
    }
}
