//! Subcommand handlers.
//!
//! Each handler builds a `StackEngine` over the real container runtime,
//! process control and handle store, runs one lifecycle operation and
//! prints the result. Only `stop` and `clean` run without a container
//! runtime on `PATH`.

use crate::output;
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use ds_core::config::loader::{load_config, load_config_file};
use ds_core::config::models::AppConfig;
use ds_core::process::UnixProcessControl;
use ds_core::runtime::CliContainerRuntime;
use ds_core::store::FileHandleStore;
use ds_core::StackEngine;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::warn;

/// Load the configuration, from `config` if given, else from `devstack.toml`.
pub async fn load(root: &Path, config: Option<&Path>) -> Result<AppConfig> {
    let loaded = match config {
        Some(path) => load_config_file(root, path).await,
        None => load_config(root).await,
    };
    loaded.wrap_err("failed to load configuration")
}

fn engine(config: AppConfig) -> Result<StackEngine> {
    let runtime = CliContainerRuntime::locate(&config.stack.database.runtime)
        .wrap_err("container runtime is not available")?;
    Ok(assemble(config, runtime))
}

/// Engine for `stop` and `clean`, which must tear down the processes even
/// when the container runtime is missing.
fn teardown_engine(config: AppConfig) -> StackEngine {
    let binary = config.stack.database.runtime.clone();
    let runtime = CliContainerRuntime::locate(&binary).unwrap_or_else(|e| {
        warn!(error = %e, "continuing without a usable container runtime");
        CliContainerRuntime::new(binary)
    });
    assemble(config, runtime)
}

fn assemble(config: AppConfig, runtime: CliContainerRuntime) -> StackEngine {
    let store = FileHandleStore::new(config.logs_dir());
    StackEngine::new(
        config,
        Arc::new(runtime),
        Arc::new(UnixProcessControl::new()),
        Arc::new(store),
    )
}

fn without_build(mut config: AppConfig, skip_build: bool) -> AppConfig {
    if skip_build {
        config.stack.build.command.clear();
    }
    config
}

pub async fn start(config: AppConfig, skip_build: bool) -> Result<()> {
    let mut engine = engine(without_build(config, skip_build))?;
    let report = engine.start().await.wrap_err("failed to start the stack")?;
    output::print_started(&report, engine.config());
    Ok(())
}

pub async fn stop(config: AppConfig) -> Result<()> {
    let mut engine = teardown_engine(config);
    let outcomes = engine.stop().await;
    output::print_stopped(&outcomes);
    Ok(())
}

pub async fn restart(config: AppConfig, skip_build: bool) -> Result<()> {
    let mut engine = engine(without_build(config, skip_build))?;
    let report = engine
        .restart()
        .await
        .wrap_err("failed to restart the stack")?;
    output::print_started(&report, engine.config());
    Ok(())
}

pub async fn clean(config: AppConfig) -> Result<()> {
    let mut engine = teardown_engine(config);
    let report = engine.clean().await;
    output::print_stopped(&report.stopped);
    output::print_cleaned(&report, engine.config());
    Ok(())
}

pub async fn status(config: AppConfig, json: bool) -> Result<()> {
    let engine = engine(config)?;
    let status = engine.status().await.wrap_err("failed to query status")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        output::print_status(&status, engine.config());
    }
    Ok(())
}

/// Follow every service log until interrupted.
pub async fn logs(config: &AppConfig) -> Result<()> {
    let files = config.log_files();
    if files.is_empty() {
        bail!(
            "no log files in {}, start the stack first",
            config.logs_dir().display()
        );
    }

    let status = Command::new("tail")
        .arg("-f")
        .args(&files)
        .status()
        .await
        .wrap_err("failed to run tail")?;

    // A signal (Ctrl-C) is the normal way out.
    if let Some(code) = status.code() {
        if code != 0 {
            bail!("tail exited with status {code}");
        }
    }
    Ok(())
}
