//! # ds-protocol
//!
//! Shared data models for devstack.
//!
//! This crate defines the structures passed between the lifecycle core and
//! the command-line front end:
//! - Persisted service handles
//! - Dependency and stack lifecycle states
//! - Stack configuration loaded from `devstack.toml`
//!
//! ## Modules
//!
//! - [`handle_models`]: Persisted handles for supervised processes and containers
//! - [`stack_models`]: Lifecycle states, stages and outcomes
//! - [`config_models`]: Immutable stack configuration
//!
//! ## Design Principles
//!
//! - Minimal dependencies: Only serde and chrono
//! - Independent compilation: No dependencies on other devstack crates

pub mod config_models;
pub mod handle_models;
pub mod stack_models;

// Re-export all public types for convenience
pub use config_models::*;
pub use handle_models::*;
pub use stack_models::*;
