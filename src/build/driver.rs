//! Build tool driver: runs goals for a subset of modules.
//!
//! The default [`CommandDriver`] shells out to the build tool and reads the
//! exception chain it leaves behind in a JSON failure report.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::throwable::{RecordedThrowable, Throwable};
use crate::project::Module;
use crate::utils::exec::{Cmd, MAVEN_FILTER, tail_lines};

/// The build command exited non-zero without leaving a report.
pub const COMMAND_FAILED: &str = "devloop.CommandFailed";
/// The build did not finish within the configured timeout.
pub const BUILD_TIMEOUT: &str = "devloop.BuildTimeout";
/// The build thread panicked or could not be started.
pub const BUILD_PANICKED: &str = "devloop.BuildPanicked";

/// Lines of build output kept in a `CommandFailed` message.
const OUTPUT_TAIL_LINES: usize = 20;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("build command is empty")]
    EmptyCommand,

    #[error("build command `{0}` not found")]
    NotFound(String, #[source] which::Error),

    #[error("cannot run build command: {0}")]
    Spawn(String),

    #[error("IO error when reading failure report `{0}`")]
    ReportIo(PathBuf, #[source] io::Error),

    #[error("malformed failure report `{0}`")]
    ReportParse(PathBuf, #[source] serde_json::Error),
}

/// Result of running goals: empty exception list means success.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub exceptions: Vec<Box<dyn Throwable>>,
}

impl BuildReport {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn failed(exception: impl Throwable + 'static) -> Self {
        Self {
            exceptions: vec![Box::new(exception)],
        }
    }

    /// A single locally raised exception.
    pub fn local(class: &str, message: impl Into<String>) -> Self {
        Self::failed(RecordedThrowable::new(class, message))
    }

    pub fn is_success(&self) -> bool {
        self.exceptions.is_empty()
    }
}

/// Runs build goals for a module subset.
///
/// Called from a dedicated build thread, never from the caller's thread.
pub trait BuildDriver: Send + Sync {
    fn run_goals(&self, modules: &[Module], goals: &[String]) -> BuildReport;
}

/// Drives the build tool as a subprocess.
///
/// Invocation: `<command..> <module_flag> a,b,c <goals..>`, run from the
/// project root.
#[derive(Debug, Clone)]
pub struct CommandDriver {
    command: Vec<String>,
    module_flag: String,
    root: PathBuf,
    failure_report: PathBuf,
}

impl CommandDriver {
    /// Create a driver, checking the program resolves from `root`.
    pub fn new(
        command: Vec<String>,
        module_flag: impl Into<String>,
        root: &Path,
        failure_report: PathBuf,
    ) -> Result<Self, DriverError> {
        let program = command.first().ok_or(DriverError::EmptyCommand)?;
        which::which_in(program, std::env::var_os("PATH"), root)
            .map_err(|e| DriverError::NotFound(program.clone(), e))?;

        Ok(Self {
            command,
            module_flag: module_flag.into(),
            root: root.to_path_buf(),
            failure_report,
        })
    }

    fn invoke(&self, modules: &[Module], goals: &[String]) -> Result<BuildReport, DriverError> {
        // A report left over from the previous run must not be mistaken for this one
        match fs::remove_file(&self.failure_report) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(DriverError::ReportIo(self.failure_report.clone(), e)),
        }

        let names = modules
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let cmd = Cmd::from_slice(&self.command[..])
            .arg(&self.module_flag)
            .arg(&names)
            .args(goals)
            .cwd(&self.root)
            .filter(&MAVEN_FILTER);
        crate::debug!("build"; "{}", cmd.display());

        let output = cmd.output().map_err(|e| DriverError::Spawn(format!("{e:#}")))?;

        let exceptions = self.read_report()?;
        if !exceptions.is_empty() {
            return Ok(BuildReport {
                exceptions: exceptions
                    .into_iter()
                    .map(|t| Box::new(t) as Box<dyn Throwable>)
                    .collect(),
            });
        }

        if output.status.success() {
            return Ok(BuildReport::success());
        }

        // Maven prints errors on stdout; fall back to it when stderr is empty
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = if stderr.trim().is_empty() { stdout } else { stderr };
        let mut message = format!("build exited with {}", output.status);
        let tail = tail_lines(&text, OUTPUT_TAIL_LINES);
        if !tail.is_empty() {
            message.push('\n');
            message.push_str(&tail);
        }
        Ok(BuildReport::local(COMMAND_FAILED, message))
    }

    fn read_report(&self) -> Result<Vec<RecordedThrowable>, DriverError> {
        let content = match fs::read_to_string(&self.failure_report) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DriverError::ReportIo(self.failure_report.clone(), e)),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        RecordedThrowable::parse_report(&content)
            .map_err(|e| DriverError::ReportParse(self.failure_report.clone(), e))
    }
}

impl BuildDriver for CommandDriver {
    fn run_goals(&self, modules: &[Module], goals: &[String]) -> BuildReport {
        self.invoke(modules, goals).unwrap_or_else(|e| {
            let message = match std::error::Error::source(&e) {
                Some(source) => format!("{e}: {source}"),
                None => e.to_string(),
            };
            BuildReport::local(COMMAND_FAILED, message)
        })
    }
}
