//! Reload decisions for the dev server.
//!
//! # Modules
//!
//! - `fingerprint` - classpath output fingerprints
//! - `state` - the check-and-rebuild state machine

pub mod fingerprint;
pub mod state;


pub use state::{ReloadOptions, Reloader};
