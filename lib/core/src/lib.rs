//! Core domain types and utilities for the switchyard workflow engine.
//!
//! This crate provides the foundational identifier types and the shared
//! `Result` alias used throughout the engine, the integration registry and
//! the bottleneck analyzer.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{NodeExecutionId, UserId, WorkflowId, WorkflowRunId};
