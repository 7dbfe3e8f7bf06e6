//! hub-builder - incremental image builds for a hub of containerized components
//!
//! This library decides which components of a hub repository need a new
//! image, builds them one at a time, and records the outcome in a build
//! ledger that drives the status readme and badge.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Business logic: discovery, staleness, update policy, coordination
//! - [`infra`] - Infrastructure layer (git, container runtime, ledger stores, reports)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
