//! Test fixtures: a throwaway project root wired to the in-memory fakes.

use ds_core::config::models::AppConfig;
use ds_core::store::FileHandleStore;
use ds_core::testing::{FakeContainerRuntime, FakeProcessControl};
use ds_core::StackEngine;
use ds_protocol::StackConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub const CONTAINER: &str = "rivet_postgres";
pub const CONTROL_PLANE_BIN: &str = "orchestrator-bin";
pub const WORKER_BIN: &str = "runner-bin";

/// Stack configuration with small budgets and the build step disabled.
pub fn test_stack_config() -> StackConfig {
    let mut stack = StackConfig::default();
    stack.build.command = Vec::new();
    stack.restart_settle_ms = 100;

    stack.database.readiness_attempts = 3;
    stack.database.readiness_interval_ms = 100;

    stack.shutdown.attempts = 3;
    stack.shutdown.interval_ms = 100;

    stack.control_plane.program = PathBuf::from(format!("bin/{CONTROL_PLANE_BIN}"));
    stack.control_plane.grace_period_ms = 200;
    stack.worker.program = PathBuf::from(format!("bin/{WORKER_BIN}"));
    stack.worker.grace_period_ms = 200;

    stack
}

/// A project root plus the fakes and store an engine is built from.
///
/// The fakes are shared with the engine, so tests can script them and
/// inspect them after the engine has acted.
pub struct TestStack {
    pub dir: TempDir,
    pub config: AppConfig,
    pub runtime: Arc<FakeContainerRuntime>,
    pub process: Arc<FakeProcessControl>,
    pub store: Arc<FileHandleStore>,
}

impl TestStack {
    pub fn new(runtime: FakeContainerRuntime, process: FakeProcessControl) -> Self {
        Self::with_config(runtime, process, test_stack_config())
    }

    pub fn with_config(
        runtime: FakeContainerRuntime,
        process: FakeProcessControl,
        stack: StackConfig,
    ) -> Self {
        let dir = tempfile::tempdir().expect("create temp project root");
        let config = AppConfig::new(dir.path(), stack);
        let store = Arc::new(FileHandleStore::new(config.logs_dir()));

        Self {
            dir,
            config,
            runtime: Arc::new(runtime),
            process: Arc::new(process),
            store,
        }
    }

    /// A fresh engine over the shared fakes, as a new supervisor run would build.
    pub fn engine(&self) -> StackEngine {
        StackEngine::new(
            self.config.clone(),
            self.runtime.clone(),
            self.process.clone(),
            self.store.clone(),
        )
    }

    /// Names of every handle record currently in the store.
    pub fn recorded(&self) -> Vec<String> {
        use ds_core::store::HandleStore;

        self.store
            .list()
            .expect("list handle records")
            .into_iter()
            .map(|handle| handle.name)
            .collect()
    }
}
