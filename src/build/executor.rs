//! Rebuild executor: runs the driver on a dedicated build thread.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError};

use super::driver::{BUILD_PANICKED, BUILD_TIMEOUT, BuildDriver, BuildReport};
use crate::project::Module;

/// Runs build goals off the calling thread and waits for the result.
///
/// With no timeout the wait is unbounded. A timed-out build is abandoned:
/// its thread keeps running and its result is discarded.
pub struct RebuildExecutor {
    driver: Arc<dyn BuildDriver>,
    timeout: Option<Duration>,
}

impl RebuildExecutor {
    pub fn new(driver: Arc<dyn BuildDriver>) -> Self {
        Self {
            driver,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn execute(&self, modules: Vec<Module>, goals: Vec<String>) -> BuildReport {
        let (tx, rx) = channel::bounded(1);
        let driver = Arc::clone(&self.driver);

        let spawned = thread::Builder::new()
            .name("devloop-build".into())
            .spawn(move || {
                let report = driver.run_goals(&modules, &goals);
                // Receiver is gone only after a timeout
                let _ = tx.send(report);
            });
        if let Err(e) = spawned {
            return BuildReport::local(BUILD_PANICKED, format!("cannot start build thread: {e}"));
        }

        let received = match self.timeout {
            Some(timeout) => rx.recv_timeout(timeout),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(report) => report,
            Err(RecvTimeoutError::Timeout) => {
                let secs = self.timeout.map_or(0, |t| t.as_secs());
                crate::log!("build"; "build did not finish within {}s, abandoning it", secs);
                BuildReport::local(BUILD_TIMEOUT, format!("build did not finish within {secs}s"))
            }
            Err(RecvTimeoutError::Disconnected) => {
                BuildReport::local(BUILD_PANICKED, "build thread panicked")
            }
        }
    }
}
