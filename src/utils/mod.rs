//! Utility modules shared across the crate.

pub mod exec;
pub mod mtime;
pub mod path;
