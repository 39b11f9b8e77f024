//! Configuration file loader for `devstack.toml`.
//!
//! A missing file is not an error: the defaults describe the standard
//! development stack. A file that exists must parse and validate.

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::models::AppConfig;
use ds_protocol::StackConfig;
use std::collections::BTreeSet;
use std::path::Path;

/// Name of the configuration file looked up in the project root.
pub const CONFIG_FILE: &str = "devstack.toml";

/// Loads the configuration for the project rooted at `root`.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - `devstack.toml` exists but cannot be read
/// - it has invalid TOML syntax or field types
/// - it fails validation (see [`validate`])
///
/// # Example
///
/// ```rust,no_run
/// use ds_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Database container: {}", config.stack.database.container);
/// # Ok(())
/// # }
/// ```
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let config_path = root.join(CONFIG_FILE);

    // If devstack.toml doesn't exist, return default config
    if !config_path.exists() {
        return Ok(AppConfig::new(root, StackConfig::default()));
    }

    load_config_file(root, &config_path).await
}

/// Loads the configuration from an explicit file, anchored at `root`.
///
/// A relative `config_path` is resolved against `root`.
pub async fn load_config_file(root: &Path, config_path: &Path) -> ConfigResult<AppConfig> {
    let config_path = root.join(config_path);
    let config_path = config_path.as_path();
    let content = tokio::fs::read_to_string(config_path)
        .await
        .map_err(|source| ConfigError::FileRead {
            path: config_path.to_path_buf(),
            source,
        })?;

    let stack: StackConfig =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: config_path.to_path_buf(),
            source,
        })?;

    validate(&stack).map_err(|reason| ConfigError::InvalidConfig {
        path: config_path.to_path_buf(),
        reason,
    })?;

    Ok(AppConfig::new(root, stack))
}

/// Checks the constraints serde cannot express.
///
/// - service names (including the container name) are non-empty, distinct,
///   and usable as file stems
/// - attempt counts are at least 1
pub fn validate(stack: &StackConfig) -> Result<(), String> {
    let names = [
        ("database.container", stack.database.container.as_str()),
        ("control-plane.name", stack.control_plane.name.as_str()),
        ("worker.name", stack.worker.name.as_str()),
    ];

    let mut seen = BTreeSet::new();
    for (field, name) in names {
        if name.trim().is_empty() {
            return Err(format!("{field} must not be empty"));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(format!("{field} '{name}' must not contain path separators"));
        }
        if !seen.insert(name) {
            return Err(format!("{field} '{name}' is used by more than one service"));
        }
    }

    if stack.database.readiness_attempts == 0 {
        return Err("database.readiness-attempts must be at least 1".to_string());
    }
    if stack.shutdown.attempts == 0 {
        return Err("shutdown.attempts must be at least 1".to_string());
    }

    Ok(())
}
