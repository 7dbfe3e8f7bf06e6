//! Configuration constants
//!
//! - [`defaults`] - Default file names, globs and limits
//! - [`urls`] - External service URLs

pub mod defaults;
pub mod urls;
