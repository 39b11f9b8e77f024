//! In-memory test doubles for the container runtime and process boundaries.
//!
//! Both fakes record what was asked of them so tests can assert on ordering,
//! and can be scripted to misbehave: never become ready, crash on start,
//! ignore graceful stop requests.

use crate::process::{ProcessControl, SpawnSpec};
use crate::runtime::{ContainerRuntime, ContainerSpec, RuntimeError};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct RuntimeState {
    exists: bool,
    running: bool,
    /// Failed checks before readiness passes; `None` never passes.
    ready_after: Option<u32>,
    failed_checks: u32,
    fail_create: bool,
    /// Every runtime call fails, as when the runtime binary is missing.
    unreachable: bool,
    calls: Vec<String>,
}

/// Fake [`ContainerRuntime`] managing a single container.
#[derive(Debug)]
pub struct FakeContainerRuntime {
    state: Mutex<RuntimeState>,
}

impl FakeContainerRuntime {
    fn with(exists: bool, running: bool) -> Self {
        Self {
            state: Mutex::new(RuntimeState {
                exists,
                running,
                ready_after: Some(0),
                failed_checks: 0,
                fail_create: false,
                unreachable: false,
                calls: Vec::new(),
            }),
        }
    }

    /// No container exists yet.
    pub fn absent() -> Self {
        Self::with(false, false)
    }

    /// The container exists but is stopped.
    pub fn stopped() -> Self {
        Self::with(true, false)
    }

    /// The container is running and ready.
    pub fn running() -> Self {
        Self::with(true, true)
    }

    /// Fail `checks` readiness checks after each start before passing.
    pub fn ready_after(self, checks: u32) -> Self {
        self.lock().ready_after = Some(checks);
        self
    }

    /// Never pass a readiness check.
    pub fn never_ready(self) -> Self {
        self.lock().ready_after = None;
        self
    }

    /// Make container creation fail.
    pub fn failing_create(self) -> Self {
        self.lock().fail_create = true;
        self
    }

    /// Make every runtime call fail.
    pub fn unreachable(self) -> Self {
        self.lock().unreachable = true;
        self
    }

    /// Mutating calls made so far, e.g. `"create rivet_postgres"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn is_container_running(&self) -> bool {
        self.lock().running
    }

    pub fn container_exists(&self) -> bool {
        self.lock().exists
    }

    /// Start or stop the container out-of-band.
    pub fn set_running(&self, running: bool) {
        let mut state = self.lock();
        state.running = running;
        state.exists |= running;
    }

    fn lock(&self) -> MutexGuard<'_, RuntimeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reachable(&self, command: &str) -> Result<MutexGuard<'_, RuntimeState>, RuntimeError> {
        let state = self.lock();
        if state.unreachable {
            return Err(RuntimeError::Spawn {
                command: command.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "runtime not found"),
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl ContainerRuntime for FakeContainerRuntime {
    async fn is_running(&self, name: &str) -> Result<bool, RuntimeError> {
        Ok(self.reachable(&format!("ps {name}"))?.running)
    }

    async fn exists(&self, name: &str) -> Result<bool, RuntimeError> {
        Ok(self.reachable(&format!("ps -a {name}"))?.exists)
    }

    async fn create_and_start(&self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        let mut state = self.reachable(&format!("run {}", spec.name))?;
        if state.fail_create {
            return Err(RuntimeError::CommandFailed {
                command: format!("run {}", spec.name),
                status: "exit status: 125".to_string(),
                stderr: "image pull failed".to_string(),
            });
        }
        state.calls.push(format!("create {}", spec.name));
        state.exists = true;
        state.running = true;
        state.failed_checks = 0;
        Ok(())
    }

    async fn start(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.reachable(&format!("start {name}"))?;
        state.calls.push(format!("start {name}"));
        state.running = true;
        state.failed_checks = 0;
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.reachable(&format!("stop {name}"))?;
        state.calls.push(format!("stop {name}"));
        state.running = false;
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.reachable(&format!("rm -f {name}"))?;
        state.calls.push(format!("remove {name}"));
        state.running = false;
        state.exists = false;
        Ok(())
    }

    async fn readiness_check(&self, _name: &str, _command: &[String]) -> bool {
        let mut state = self.lock();
        if state.unreachable || !state.running {
            return false;
        }
        let ready_after = state.ready_after;
        match ready_after {
            Some(checks) if state.failed_checks >= checks => true,
            Some(_) => {
                state.failed_checks += 1;
                false
            }
            None => false,
        }
    }
}

#[derive(Debug)]
struct ProcessState {
    next_pid: u32,
    alive: BTreeSet<u32>,
    programs: BTreeMap<u32, String>,
    spawned: Vec<SpawnSpec>,
    stop_requests: Vec<u32>,
    crash_on_start: BTreeSet<String>,
    ignore_stop: BTreeSet<String>,
    fail_spawn: BTreeSet<String>,
}

/// Fake [`ProcessControl`] that tracks processes by program file name.
#[derive(Debug)]
pub struct FakeProcessControl {
    state: Mutex<ProcessState>,
}

impl Default for FakeProcessControl {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProcessControl {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ProcessState {
                next_pid: 1000,
                alive: BTreeSet::new(),
                programs: BTreeMap::new(),
                spawned: Vec::new(),
                stop_requests: Vec::new(),
                crash_on_start: BTreeSet::new(),
                ignore_stop: BTreeSet::new(),
                fail_spawn: BTreeSet::new(),
            }),
        }
    }

    /// Processes running `program` exit immediately after spawn.
    pub fn crash_on_start(self, program: &str) -> Self {
        self.lock().crash_on_start.insert(program.to_string());
        self
    }

    /// Processes running `program` ignore graceful stop requests.
    pub fn ignore_stop(self, program: &str) -> Self {
        self.lock().ignore_stop.insert(program.to_string());
        self
    }

    /// Spawning `program` fails as if it did not exist.
    pub fn fail_spawn(self, program: &str) -> Self {
        self.lock().fail_spawn.insert(program.to_string());
        self
    }

    /// Register a live process that was not spawned through this fake,
    /// e.g. one left behind by an earlier supervisor run.
    pub fn start_external(&self, program: &str) -> u32 {
        let mut state = self.lock();
        let pid = state.next_pid;
        state.next_pid += 1;
        state.alive.insert(pid);
        state.programs.insert(pid, program.to_string());
        pid
    }

    /// Make a process exit on its own.
    pub fn exit(&self, pid: u32) {
        self.lock().alive.remove(&pid);
    }

    /// Every spawn request, in order.
    pub fn spawned(&self) -> Vec<SpawnSpec> {
        self.lock().spawned.clone()
    }

    /// Program names of every spawn request, in order.
    pub fn spawned_programs(&self) -> Vec<String> {
        self.spawned().iter().map(program_name).collect()
    }

    /// Pids that received a stop request, in order.
    pub fn stop_requests(&self) -> Vec<u32> {
        self.lock().stop_requests.clone()
    }

    /// Program names of processes that received a stop request, in order.
    pub fn stopped_programs(&self) -> Vec<String> {
        let state = self.lock();
        state
            .stop_requests
            .iter()
            .filter_map(|pid| state.programs.get(pid).cloned())
            .collect()
    }

    /// Pids currently alive.
    pub fn alive(&self) -> Vec<u32> {
        self.lock().alive.iter().copied().collect()
    }

    fn lock(&self) -> MutexGuard<'_, ProcessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn program_name(spec: &SpawnSpec) -> String {
    spec.program
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl ProcessControl for FakeProcessControl {
    fn spawn(&self, spec: &SpawnSpec, _output: File) -> io::Result<u32> {
        let program = program_name(spec);
        let mut state = self.lock();
        if state.fail_spawn.contains(&program) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{program}: not found"),
            ));
        }

        let pid = state.next_pid;
        state.next_pid += 1;
        state.spawned.push(spec.clone());
        if !state.crash_on_start.contains(&program) {
            state.alive.insert(pid);
        }
        state.programs.insert(pid, program);
        Ok(pid)
    }

    fn request_stop(&self, pid: u32) -> io::Result<()> {
        let mut state = self.lock();
        state.stop_requests.push(pid);
        if !state.alive.contains(&pid) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such process"));
        }
        let ignores = state
            .programs
            .get(&pid)
            .is_some_and(|program| state.ignore_stop.contains(program));
        if !ignores {
            state.alive.remove(&pid);
        }
        Ok(())
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.lock().alive.contains(&pid)
    }
}
