//! Global config handle.
//!
//! Uses `arc-swap` for lock-free reads from the request threads.

use crate::config::DevloopConfig;
use arc_swap::ArcSwap;
use std::sync::{Arc, LazyLock};

/// Global config storage.
pub static CONFIG: LazyLock<ArcSwap<DevloopConfig>> =
    LazyLock::new(|| ArcSwap::from_pointee(DevloopConfig::default()));

#[inline]
pub fn cfg() -> Arc<DevloopConfig> {
    CONFIG.load_full()
}

#[inline]
pub fn init_config(config: DevloopConfig) -> Arc<DevloopConfig> {
    let arc = Arc::new(config);
    CONFIG.store(Arc::clone(&arc));
    arc
}
