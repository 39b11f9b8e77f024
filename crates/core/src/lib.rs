//! # ds-core
//!
//! Lifecycle core for devstack.
//!
//! This crate provides:
//! - Configuration loading from `devstack.toml`
//! - A persisted handle store recording what the supervisor started
//! - The container runtime and process boundaries, with test doubles
//! - Readiness polling, process launching and graceful shutdown
//! - The stack engine sequencing start, stop, restart and clean
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and management
//! - [`store`]: Handle records that survive supervisor restarts
//! - [`runtime`]: Container runtime abstraction
//! - [`process`]: Process spawning and launching
//! - [`probe`]: Bounded readiness polling
//! - [`dependency`]: Database container controller
//! - [`shutdown`]: Graceful stop of recorded services
//! - [`engine`]: Stack lifecycle engine

pub mod config;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod probe;
pub mod process;
pub mod runtime;
pub mod shutdown;
pub mod store;
pub mod testing;

pub use engine::StackEngine;
pub use error::{LifecycleError, LifecycleResult, StartError};
