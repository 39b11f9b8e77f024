//! Resolved application configuration.
//!
//! `AppConfig` pairs the stack configuration with the project root it was
//! loaded from, and answers every "where does this live" question relative
//! to that root.

use ds_protocol::{ServiceConfig, StackConfig};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Stack configuration anchored at a project root.
///
/// # Example
///
/// ```rust,no_run
/// use ds_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Logs are in {}", config.logs_dir().display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Project root; relative paths in `stack` are resolved against it.
    pub root: PathBuf,

    /// The stack configuration as loaded.
    pub stack: StackConfig,
}

impl AppConfig {
    pub fn new(root: impl Into<PathBuf>, stack: StackConfig) -> Self {
        Self {
            root: root.into(),
            stack,
        }
    }

    /// Directory holding log files and handle records.
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(&self.stack.logs_dir)
    }

    /// Log file of the service named `name`.
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.logs_dir().join(format!("{name}.log"))
    }

    /// Working directory of `service`.
    pub fn working_dir(&self, service: &ServiceConfig) -> PathBuf {
        match &service.working_dir {
            Some(dir) => self.root.join(dir),
            None => self.root.clone(),
        }
    }

    /// Executable of `service`.
    ///
    /// Bare program names are left for `PATH` lookup; anything with a
    /// directory component is resolved against the project root.
    pub fn program_path(&self, service: &ServiceConfig) -> PathBuf {
        if is_bare_name(&service.program) {
            service.program.clone()
        } else {
            self.root.join(&service.program)
        }
    }

    /// Every `*.log` file currently in the logs directory, sorted by name.
    pub fn log_files(&self) -> Vec<PathBuf> {
        WalkDir::new(self.logs_dir())
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("log"))
            .collect()
    }

    /// Service names in start order: dependency, control plane, worker.
    pub fn start_order(&self) -> [&str; 3] {
        [
            self.stack.database.container.as_str(),
            self.stack.control_plane.name.as_str(),
            self.stack.worker.name.as_str(),
        ]
    }
}

fn is_bare_name(program: &Path) -> bool {
    let mut components = program.components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
