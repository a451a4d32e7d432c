//! `devloop serve`: the dev server loop.

use std::sync::Arc;

use anyhow::Result;

use super::common::create_reloader;
use crate::config::DevloopConfig;
use crate::server::DevServer;

/// Serve until Ctrl+C, then stop watching.
pub fn serve(config: &DevloopConfig) -> Result<()> {
    let reloader = Arc::new(create_reloader(config, config.serve.watch)?);
    let server = Arc::new(DevServer::new(Arc::clone(&reloader)));

    let result = server.run();
    reloader.close();
    result
}
