//! Core business logic module
//!
//! Decides what to build and records what happened. Process execution,
//! git and network access live in [`crate::infra`] behind the traits
//! declared here.
//!
//! # Submodules
//!
//! - [`settings`] - Repository settings (`hub-builder.toml`)
//! - [`target`] - Component discovery and canonical names
//! - [`manifest`] - Component manifest parsing and validation
//! - [`policy`] - Update-policy gate
//! - [`staleness`] - Which components changed since their last build
//! - [`ledger`] - Build history model
//! - [`coordinator`] - Sequential build orchestration
//! - [`report`] - Status readme rendering and build reasons

pub mod coordinator;
pub mod ledger;
pub mod manifest;
pub mod policy;
pub mod report;
pub mod settings;
pub mod staleness;
pub mod target;
