//! Module graph and rebuild scoping.

pub mod graph;
pub mod scope;

pub use graph::{Module, ModuleGraph};
pub use scope::{BuildScope, ScopeFlags, compute_scope};
