//! Shared setup for commands that drive the reloader.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::build::{CommandDriver, FailureClassifier, RebuildExecutor};
use crate::config::DevloopConfig;
use crate::reloader::{ReloadOptions, Reloader};

/// Reloader wired to the configured build command.
///
/// `watch` overrides `serve.watch`; one-shot commands never watch.
pub fn create_reloader(config: &DevloopConfig, watch: bool) -> Result<Reloader> {
    let graph = Arc::new(config.module_graph()?);

    let driver = CommandDriver::new(
        config.build.command.clone(),
        config.build.module_flag.clone(),
        &config.root,
        config.failure_report(),
    )
    .context("cannot run the configured build command")?;
    let executor = RebuildExecutor::new(Arc::new(driver)).with_timeout(config.build.timeout());

    let options = ReloadOptions {
        goals: config.build.goals.clone(),
        additional_goals: config.build.additional_goals.clone(),
        main_module: config.main_module_index()?,
        watch,
    };

    Ok(Reloader::new(graph, executor, options)
        .with_classifier(FailureClassifier::new(config.classifier.clone())))
}
