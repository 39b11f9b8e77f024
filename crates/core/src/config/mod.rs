//! Configuration loading and management.
//!
//! This module loads `devstack.toml` from the project root and resolves the
//! paths it contains against that root.

pub mod error;
pub mod loader;
pub mod models;
