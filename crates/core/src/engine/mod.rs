//! Stack lifecycle engine.
//!
//! The StackEngine sequences the dependency, the optional build step, the
//! control plane and the worker for `start`, and tears them down in reverse
//! order for `stop`. A failed start stage rolls back every earlier stage
//! before the failure is reported, leaving the stack as it was before.

use crate::config::models::AppConfig;
use crate::dependency::DependencyController;
use crate::error::{LifecycleError, LifecycleResult, StartError};
use crate::probe::RetryPolicy;
use crate::process::{LaunchOutcome, LaunchRequest, ProcessControl, ProcessLauncher, SpawnSpec};
use crate::runtime::ContainerRuntime;
use crate::shutdown::ShutdownController;
use crate::store::HandleStore;
use ds_protocol::{
    CleanReport, HandleKind, ServiceConfig, ServiceStatus, Stage, StackState, StackStatus,
    StartReport, StopOutcome,
};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Drives the whole stack through its lifecycle.
pub struct StackEngine {
    config: AppConfig,
    process: Arc<dyn ProcessControl>,
    runtime: Arc<dyn ContainerRuntime>,
    store: Arc<dyn HandleStore>,
    dependency: DependencyController,
    launcher: ProcessLauncher,
    shutdown: ShutdownController,
    state: StackState,
}

impl StackEngine {
    /// Create a new StackEngine.
    ///
    /// # Arguments
    ///
    /// * `config` - Immutable stack configuration anchored at the project root
    /// * `runtime` - Container runtime used for the dependency
    /// * `process` - Process capability used for the application processes
    /// * `store` - Persisted handle store shared by every component
    pub fn new(
        config: AppConfig,
        runtime: Arc<dyn ContainerRuntime>,
        process: Arc<dyn ProcessControl>,
        store: Arc<dyn HandleStore>,
    ) -> Self {
        let dependency =
            DependencyController::new(runtime.clone(), store.clone(), &config.stack.database);
        let launcher = ProcessLauncher::new(process.clone(), store.clone());
        let shutdown = ShutdownController::new(
            process.clone(),
            runtime.clone(),
            store.clone(),
            RetryPolicy::new(
                config.stack.shutdown.attempts,
                config.stack.shutdown.interval(),
            ),
        );

        Self {
            config,
            process,
            runtime,
            store,
            dependency,
            launcher,
            shutdown,
            state: StackState::Stopped,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Where this engine is in the start sequence.
    pub fn state(&self) -> StackState {
        self.state
    }

    /// Bring the stack up in dependency order.
    ///
    /// Services that are already running are left alone, so starting a
    /// running stack launches nothing and succeeds.
    ///
    /// # Errors
    ///
    /// Returns a `StartError` naming the failed stage. By the time it is
    /// returned, every earlier stage has been stopped again.
    pub async fn start(&mut self) -> Result<StartReport, StartError> {
        let mut started: Vec<String> = Vec::new();
        let mut launched: Vec<String> = Vec::new();

        // Stage 1: dependency
        self.transition(StackState::DependencyPending);
        let address = match self.dependency.ensure_ready().await {
            Ok(address) => address,
            Err(source) => return Err(self.roll_back(Stage::Dependency, source, &started).await),
        };
        started.push(self.dependency.name().to_string());
        self.transition(StackState::DependencyReady);

        if self.config.stack.build.is_enabled() {
            if let Err(source) = self.build().await {
                return Err(self.roll_back(Stage::Build, source, &started).await);
            }
        }

        // Stage 2: control plane
        let control_plane = self.config.stack.control_plane.clone();
        match self.launch(&control_plane, &address).await {
            Ok(outcome) => record_launch(&outcome, &mut launched),
            Err(source) => {
                return Err(self.roll_back(Stage::ControlPlane, source, &started).await)
            }
        }
        started.push(control_plane.name);
        self.transition(StackState::ControlPlaneUp);

        // Stage 3: worker
        let worker = self.config.stack.worker.clone();
        match self.launch(&worker, &address).await {
            Ok(outcome) => record_launch(&outcome, &mut launched),
            Err(source) => return Err(self.roll_back(Stage::Worker, source, &started).await),
        }
        self.transition(StackState::WorkerUp);

        self.transition(StackState::Running);
        info!(dependency = %address, launched = launched.len(), "stack running");

        Ok(StartReport {
            dependency_address: address,
            control_plane_endpoint: control_plane.endpoint,
            launched,
        })
    }

    /// Stop worker, control plane and dependency, in that order.
    ///
    /// Every service is attempted regardless of what happened to the ones
    /// before it. Returns what happened to each service.
    pub async fn stop(&mut self) -> Vec<(String, StopOutcome)> {
        let order: Vec<String> = self
            .config
            .start_order()
            .iter()
            .rev()
            .map(|name| name.to_string())
            .collect();

        let mut outcomes = Vec::with_capacity(order.len());
        for name in order {
            let outcome = self.shutdown.stop(&name).await;
            debug!(service = %name, ?outcome, "stop finished");
            outcomes.push((name, outcome));
        }

        self.transition(StackState::Stopped);
        outcomes
    }

    /// Stop, wait for the settle delay, then start.
    ///
    /// # Errors
    ///
    /// Returns the `StartError` of the start half.
    pub async fn restart(&mut self) -> Result<StartReport, StartError> {
        self.stop().await;
        tokio::time::sleep(self.config.stack.restart_settle()).await;
        self.start().await
    }

    /// Stop everything and remove the dependency container with its data.
    ///
    /// Like `stop`, this never fails; a removal failure is logged and
    /// reported in the returned `CleanReport`.
    pub async fn clean(&mut self) -> CleanReport {
        let stopped = self.stop().await;
        let container_removed = match self.dependency.remove().await {
            Ok(()) => true,
            Err(e) => {
                warn!(container = self.dependency.name(), error = %e, "failed to remove container");
                false
            }
        };
        CleanReport {
            stopped,
            container_removed,
        }
    }

    /// Report the dependency state and every recorded handle with its liveness.
    ///
    /// # Errors
    ///
    /// Returns an error if the container runtime or the handle store fails.
    pub async fn status(&self) -> LifecycleResult<StackStatus> {
        let dependency = self.dependency.state().await?;

        let mut services = Vec::new();
        for handle in self.store.list()? {
            let alive = match &handle.kind {
                HandleKind::Process { pid } => self.process.is_alive(*pid),
                HandleKind::Container { container } => self.container_alive(container).await,
            };
            services.push(ServiceStatus { handle, alive });
        }

        Ok(StackStatus {
            dependency,
            services,
        })
    }

    async fn container_alive(&self, container: &str) -> bool {
        match self.runtime.is_running(container).await {
            Ok(running) => running,
            Err(e) => {
                warn!(container, error = %e, "could not query container, reporting it dead");
                false
            }
        }
    }

    async fn launch(
        &self,
        service: &ServiceConfig,
        dependency_address: &str,
    ) -> LifecycleResult<LaunchOutcome> {
        let request = self.launch_request(service, dependency_address);
        self.launcher.launch(&request).await
    }

    fn launch_request(&self, service: &ServiceConfig, dependency_address: &str) -> LaunchRequest {
        let mut env = service.env.clone();
        if let Some(var) = &service.dependency_env {
            env.insert(var.clone(), dependency_address.to_string());
        }

        LaunchRequest {
            service: service.name.clone(),
            spawn: SpawnSpec {
                program: self.config.program_path(service),
                args: service.args.clone(),
                working_dir: self.config.working_dir(service),
                env,
            },
            log_path: self.config.log_path(&service.name),
            grace_period: service.grace_period(),
        }
    }

    async fn build(&self) -> LifecycleResult<()> {
        let command = &self.config.stack.build.command;
        let Some((program, args)) = command.split_first() else {
            return Ok(());
        };
        let shown = command.join(" ");

        info!(command = %shown, "building");
        let status = Command::new(program)
            .args(args)
            .current_dir(&self.config.root)
            .status()
            .await
            .map_err(|e| LifecycleError::BuildFailed {
                command: shown.clone(),
                reason: e.to_string(),
            })?;

        if !status.success() {
            return Err(LifecycleError::BuildFailed {
                command: shown,
                reason: status.to_string(),
            });
        }
        Ok(())
    }

    /// Stop every stage in `started`, newest first, then report `source`.
    async fn roll_back(
        &mut self,
        stage: Stage,
        source: LifecycleError,
        started: &[String],
    ) -> StartError {
        warn!(%stage, error = %source, "start failed");
        for name in started.iter().rev() {
            let outcome = self.shutdown.stop(name).await;
            info!(service = %name, ?outcome, "rolled back");
        }
        self.transition(StackState::Stopped);
        StartError { stage, source }
    }

    fn transition(&mut self, next: StackState) {
        debug!(from = ?self.state, to = ?next, "stack state");
        self.state = next;
    }
}

fn record_launch(outcome: &LaunchOutcome, launched: &mut Vec<String>) {
    if outcome.is_new() {
        launched.push(outcome.handle().name.clone());
    }
}
