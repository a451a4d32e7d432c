//! Result of one reload check.

use std::fmt;
use std::path::PathBuf;

use super::pointer::render_failure;
use crate::logger;

/// A user-correctable compile error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationFailure {
    pub source: Option<PathBuf>,
    pub message: String,
    pub line: Option<u32>,
    /// Characters preceding the offending position on `line`.
    pub column: Option<u32>,
}

/// Anything else that made the build fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueBuildError {
    /// Simple class name of the failing exception.
    pub description: String,
    pub cause: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Nothing changed, nothing built.
    NoChange,
    /// The application must be discarded and recreated.
    ReloadRequired,
    /// A rebuild ran but produced no observable change.
    NoReloadNeeded,
    CompilationFailure(CompilationFailure),
    OpaqueBuildError(OpaqueBuildError),
}

impl BuildOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::CompilationFailure(_) | Self::OpaqueBuildError(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NoChange => "no change",
            Self::ReloadRequired => "reload required",
            Self::NoReloadNeeded => "no reload needed",
            Self::CompilationFailure(_) => "compilation failure",
            Self::OpaqueBuildError(_) => "build error",
        }
    }

    /// Show this outcome in the reload status block.
    pub fn report(&self, generation: u64) {
        match self {
            Self::NoChange => logger::status_unchanged("no changes"),
            Self::ReloadRequired => {
                logger::status_success(&format!("reloaded (generation {generation})"))
            }
            Self::NoReloadNeeded => logger::status_unchanged("rebuilt, classes unchanged"),
            Self::CompilationFailure(failure) => {
                logger::status_error("compilation failed", &render_failure(failure))
            }
            Self::OpaqueBuildError(error) => logger::status_error("build failed", &error.to_string()),
        }
    }
}

impl fmt::Display for CompilationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.source, self.line) {
            (Some(source), Some(line)) => write!(f, "{}:{}: ", source.display(), line)?,
            (Some(source), None) => write!(f, "{}: ", source.display())?,
            _ => {}
        }
        f.write_str(&self.message)
    }
}

impl fmt::Display for OpaqueBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}", self.description, cause),
            None => f.write_str(&self.description),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display() {
        let failure = CompilationFailure {
            source: Some(PathBuf::from("/src/Foo.scala")),
            message: "expected ';'".into(),
            line: Some(10),
            column: Some(5),
        };
        assert_eq!(failure.to_string(), "/src/Foo.scala:10: expected ';'");

        let opaque = OpaqueBuildError {
            description: "DependencyResolutionException".into(),
            cause: Some("could not resolve".into()),
        };
        assert_eq!(
            opaque.to_string(),
            "DependencyResolutionException: could not resolve"
        );
    }

    #[test]
    fn test_is_failure() {
        assert!(!BuildOutcome::NoChange.is_failure());
        assert!(!BuildOutcome::ReloadRequired.is_failure());
        assert!(
            BuildOutcome::OpaqueBuildError(OpaqueBuildError {
                description: "X".into(),
                cause: None
            })
            .is_failure()
        );
    }
}
