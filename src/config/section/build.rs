//! `[build]` section configuration.
//!
//! How the build tool is invoked for a rebuild.
//!
//! # Example
//!
//! ```toml
//! [build]
//! command = ["mvn", "--batch-mode"]   # Build tool invocation prefix
//! module_flag = "-pl"                 # Flag passing the comma-separated module list
//! goals = ["compile"]                 # Run across the rebuild scope
//! additional_goals = ["play2:enhance"]  # Run once on the main module after success
//! main_module = "web"                 # Default: last declared module
//! failure_report = "target/devloop-failure.json"
//! timeout_secs = 0                    # 0 = wait as long as the build takes
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Program and leading arguments.
    pub command: Vec<String>,

    /// Flag preceding the module list.
    pub module_flag: String,

    /// Main goal list, run across the computed scope.
    pub goals: Vec<String>,

    /// Run on the main module only, after the main goals succeed.
    pub additional_goals: Vec<String>,

    /// Module dev mode runs from. `None` means the last declared module.
    pub main_module: Option<String>,

    /// JSON exception chain written by the build on failure
    /// (relative to the project root).
    pub failure_report: PathBuf,

    /// Give up waiting for a build after this many seconds. `0` disables.
    pub timeout_secs: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            command: vec!["mvn".into(), "--batch-mode".into()],
            module_flag: "-pl".into(),
            goals: vec!["compile".into()],
            additional_goals: Vec::new(),
            main_module: None,
            failure_report: "target/devloop-failure.json".into(),
            timeout_secs: 0,
        }
    }
}

impl BuildConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.command.first().is_none_or(|p| p.trim().is_empty()) {
            diag.error_with_hint(
                "build.command",
                "build command is empty",
                "e.g. command = [\"mvn\", \"--batch-mode\"]",
            );
        }
        if self.goals.is_empty() {
            diag.error("build.goals", "at least one goal is required");
        }
        if self.module_flag.trim().is_empty() {
            diag.error("build.module_flag", "module flag is empty");
        }
    }
}
