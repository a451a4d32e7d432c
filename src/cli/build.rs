//! `devloop build`: one full build through the reload engine.

use anyhow::{Result, bail};

use super::common::create_reloader;
use crate::config::DevloopConfig;

/// Build every module once. Fails when the build does.
pub fn build_once(config: &DevloopConfig) -> Result<()> {
    let reloader = create_reloader(config, false)?;
    let outcome = reloader.build();
    outcome.report(1);

    if outcome.is_failure() {
        bail!("build failed: {}", outcome.label());
    }
    Ok(())
}
