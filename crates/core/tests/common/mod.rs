//! Common test utilities shared by the lifecycle integration tests.

#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::*;
