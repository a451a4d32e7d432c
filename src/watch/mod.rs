//! File watching: the change tracker and the watch service feeding it.

pub mod service;
mod tracker;

pub use service::{ChangeCallback, NotifyWatchService, WatchHandle, WatchService};
pub use tracker::{ChangeSet, FileChangeTracker};
