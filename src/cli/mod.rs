//! Command-line interface module.

mod args;
pub mod build;
pub mod common;
pub mod scope;
pub mod serve;

pub use args::{Cli, Commands};
